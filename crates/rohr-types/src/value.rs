//! Dynamic record values inspected and mutated by the pipeline.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordered map of named fields.
pub type Fields = IndexMap<String, Value>;

/// A node of a structured record: maps, sequences and scalars.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    Object(Fields),
}

/// Semantic kind of a [`Value`], as reported in type-mismatch errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    #[serde(rename = "null")]
    Null,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "NaN")]
    NotANumber,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "array")]
    Array,
    #[serde(rename = "object")]
    Object,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Boolean => "boolean",
            Kind::Number => "number",
            Kind::NotANumber => "NaN",
            Kind::String => "string",
            Kind::Date => "date",
            Kind::Array => "array",
            Kind::Object => "object",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    /// Build an object from field/value pairs.
    pub fn object(fields: impl IntoIterator<Item = (impl Into<String>, Value)>) -> Self {
        Value::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// An empty object.
    pub fn empty_object() -> Self {
        Value::Object(Fields::new())
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Boolean,
            Value::Number(n) if n.is_nan() => Kind::NotANumber,
            Value::Number(_) => Kind::Number,
            Value::String(_) => Kind::String,
            Value::Date(_) => Kind::Date,
            Value::Array(_) => Kind::Array,
            Value::Object(_) => Kind::Object,
        }
    }

    /// Objects and arrays can be scoped into; everything else is a scalar.
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Fields> {
        match self {
            Value::Object(fields) => Some(fields),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Field access on composites
    // -----------------------------------------------------------------------

    /// Look up a named field. Arrays are addressed by decimal index.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.get(name),
            Value::Array(items) => name.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        match self {
            Value::Object(fields) => fields.get_mut(name),
            Value::Array(items) => name
                .parse::<usize>()
                .ok()
                .and_then(move |i| items.get_mut(i)),
            _ => None,
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Whether [`Value::set_field`] can assign `name`: any name on an object,
    /// an existing index or the next free one on an array.
    pub fn accepts_field(&self, name: &str) -> bool {
        match self {
            Value::Object(_) => true,
            Value::Array(items) => name.parse::<usize>().is_ok_and(|i| i <= items.len()),
            _ => false,
        }
    }

    /// Assign a field, creating it if needed. Returns `false` when
    /// [`Value::accepts_field`] rejects `name`.
    pub fn set_field(&mut self, name: &str, value: Value) -> bool {
        if !self.accepts_field(name) {
            return false;
        }
        match self {
            Value::Object(fields) => {
                fields.insert(name.to_string(), value);
            }
            Value::Array(items) => match name.parse::<usize>() {
                Ok(i) if i < items.len() => items[i] = value,
                _ => items.push(value),
            },
            _ => return false,
        }
        true
    }

    /// Delete a field. Array slots are emptied to `Null` so sibling indices stay put.
    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        match self {
            Value::Object(fields) => fields.shift_remove(name),
            Value::Array(items) => name
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get_mut(i))
                .map(std::mem::take),
            _ => None,
        }
    }

    /// Natural stringification of a value.
    pub fn stringify(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.to_rfc3339_opts(SecondsFormat::Millis, true),
            Value::Array(items) => items
                .iter()
                .map(Value::stringify)
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => serde_json::Value::from(self).to_string(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i128)
    } else {
        n.to_string()
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => {
                serde_json::Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Object(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        serde_json::Value::from(&value)
    }
}

/// Integral doubles become JSON integers; non-finite doubles become `null`.
fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<Fields> for Value {
    fn from(value: Fields) -> Self {
        Value::Object(value)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_json::Value::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stringify())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn kind_reports_each_variant() {
        assert_eq!(Value::Null.kind(), Kind::Null);
        assert_eq!(Value::from(true).kind(), Kind::Boolean);
        assert_eq!(Value::from(4).kind(), Kind::Number);
        assert_eq!(Value::Number(f64::NAN).kind(), Kind::NotANumber);
        assert_eq!(Value::from("x").kind(), Kind::String);
        assert_eq!(Value::Date(Utc::now()).kind(), Kind::Date);
        assert_eq!(Value::from(json!([1])).kind(), Kind::Array);
        assert_eq!(Value::from(json!({})).kind(), Kind::Object);
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Kind::Boolean).unwrap(), "\"boolean\"");
        assert_eq!(serde_json::to_string(&Kind::NotANumber).unwrap(), "\"NaN\"");
        assert_eq!(Kind::Object.to_string(), "object");
    }

    #[test]
    fn composite_covers_objects_and_arrays() {
        assert!(Value::empty_object().is_composite());
        assert!(Value::Array(vec![]).is_composite());
        assert!(!Value::from("x").is_composite());
        assert!(!Value::Null.is_composite());
    }

    #[test]
    fn object_fields_keep_insertion_order() {
        let mut v = Value::object([("b", Value::from(1)), ("a", Value::from(2))]);
        v.set_field("c", Value::from(3));
        v.remove_field("b");
        let keys: Vec<_> = v.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn array_fields_are_indexed() {
        let mut v = Value::from(json!([10, 20]));
        assert_eq!(v.field("1"), Some(&Value::from(20)));
        assert_eq!(v.field("x"), None);
        assert!(v.set_field("2", Value::from(30)));
        assert!(!v.set_field("9", Value::from(0)));
        assert!(!v.accepts_field("x"));
        assert!(v.accepts_field("3"));
        assert_eq!(v.remove_field("0"), Some(Value::from(10)));
        assert_eq!(v, Value::from(json!([null, 20, 30])));
    }

    #[test]
    fn scalars_have_no_fields() {
        let mut v = Value::from(4);
        assert!(!v.has_field("a"));
        assert!(!v.set_field("a", Value::Null));
        assert_eq!(v.remove_field("a"), None);
    }

    #[test]
    fn stringify_numbers_like_a_wire_format() {
        assert_eq!(Value::from(84).stringify(), "84");
        assert_eq!(Value::from(1.5).stringify(), "1.5");
        assert_eq!(Value::Number(f64::NAN).stringify(), "NaN");
        assert_eq!(Value::Number(f64::NEG_INFINITY).stringify(), "-Infinity");
        assert_eq!(Value::from(json!([1, "a", true])).stringify(), "1,a,true");
        assert_eq!(Value::from(json!({"a": 1})).stringify(), "{\"a\":1}");
    }

    #[test]
    fn json_conversion_keeps_integers_integral() {
        let v = Value::from(json!({"n": 84, "f": 0.5, "s": "x", "l": [null, false]}));
        let back = serde_json::Value::from(&v);
        assert_eq!(back, json!({"n": 84, "f": 0.5, "s": "x", "l": [null, false]}));
        assert_eq!(serde_json::to_string(&back["n"]).unwrap(), "84");
    }

    #[test]
    fn nan_and_dates_serialize_as_json_scalars() {
        let date = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let v = Value::object([("d", Value::Date(date)), ("n", Value::Number(f64::NAN))]);
        assert_eq!(
            serde_json::to_value(&v).unwrap(),
            json!({"d": "2020-01-02T03:04:05.000Z", "n": null})
        );
    }

    #[test]
    fn deserializes_from_json_text() {
        let v: Value = serde_json::from_str(r#"{"foo": "42", "bar": [1, 2]}"#).unwrap();
        assert_eq!(v.field("foo"), Some(&Value::from("42")));
        assert_eq!(v.field("bar").and_then(|b| b.field("1")), Some(&Value::from(2)));
    }
}
