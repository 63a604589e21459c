//! `cast_to`: coercion of the selected field to a fixed set of kinds.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rohr_types::{RohrError, Value};

use crate::engine::{Continuation, Pipeline};

/// Target kind of [`Pipeline::cast_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Integer,
    Float,
    String,
    Date,
}

impl FromStr for CastKind {
    type Err = RohrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integer" => Ok(CastKind::Integer),
            "float" => Ok(CastKind::Float),
            "string" => Ok(CastKind::String),
            "date" => Ok(CastKind::Date),
            other => Err(RohrError::UnknownCastKind(other.to_string())),
        }
    }
}

impl fmt::Display for CastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CastKind::Integer => "integer",
            CastKind::Float => "float",
            CastKind::String => "string",
            CastKind::Date => "date",
        })
    }
}

impl CastKind {
    /// Convert `value`. Numeric casts never fail; unparsable input becomes `NaN`.
    pub fn apply(&self, value: &Value) -> Value {
        match self {
            CastKind::Integer => Value::Number(parse_int(&value.stringify())),
            CastKind::Float => Value::Number(parse_float(&value.stringify())),
            CastKind::String => Value::String(value.stringify()),
            CastKind::Date => to_date(value).map(Value::Date).unwrap_or(Value::Null),
        }
    }
}

/// Parse a leading base-10 integer, ignoring leading whitespace and any
/// trailing garbage (`"42px"` is 42).
pub fn parse_int(input: &str) -> f64 {
    let s = input.trim_start();
    let (negative, rest) = split_sign(s);
    let digits: &str = &rest[..rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len())];
    if digits.is_empty() {
        return f64::NAN;
    }
    let magnitude: f64 = digits.parse().unwrap_or(f64::NAN);
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// Parse the longest leading decimal literal (with optional fraction and
/// exponent, or `Infinity`), ignoring leading whitespace.
pub fn parse_float(input: &str) -> f64 {
    let s = input.trim_start();
    let (negative, rest) = split_sign(s);
    let sign = if negative { -1.0 } else { 1.0 };
    if rest.starts_with("Infinity") {
        return sign * f64::INFINITY;
    }

    let bytes = rest.as_bytes();
    let mut end = 0;
    let mut mantissa_digits = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        mantissa_digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            mantissa_digits += 1;
        }
    }
    if mantissa_digits == 0 {
        return f64::NAN;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    let literal = rest[..end].trim_end_matches('.');
    let literal = if literal.starts_with('.') {
        format!("0{literal}")
    } else {
        literal.to_string()
    };
    sign * literal.parse::<f64>().unwrap_or(f64::NAN)
}

fn split_sign(s: &str) -> (bool, &str) {
    if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    }
}

/// Build a UTC timestamp from a date, epoch milliseconds, or a date string
/// (RFC 3339, `YYYY-MM-DDTHH:MM:SS[.f]`, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`).
pub fn to_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Date(date) => Some(*date),
        Value::Number(millis) if millis.is_finite() => {
            Utc.timestamp_millis_opt(*millis as i64).single()
        }
        Value::String(s) => parse_date(s.trim()),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl Pipeline {
    /// Coerce the selected field to `kind`.
    ///
    /// Parse failures are not reported here: an integer or float cast yields
    /// `NaN` (caught by a later `is_number`), a date cast yields `null`.
    pub fn cast_to(self, kind: CastKind) -> Self {
        self.sequence("cast_to", move |tree| {
            let Some(field) = tree.selected_field("cast_to")? else {
                return Ok(Continuation::Done);
            };
            let cast = kind.apply(tree.field_value(&field));
            tree.write_field(&field, cast);
            Ok(Continuation::Done)
        })
    }
}
