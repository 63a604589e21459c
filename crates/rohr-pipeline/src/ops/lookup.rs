//! `lookup`: replace the selected field with the entry it refers to.

use rohr_types::{RohrError, ValidationError, Value};

use crate::engine::{Continuation, Pipeline};

impl Pipeline {
    /// Resolve the selected field against `haystack`.
    ///
    /// For an array, the field becomes the first element whose `key` field
    /// equals the current value. For an object, it becomes the entry named by
    /// the current value. No hit records `LookupFailed`; any other haystack is
    /// [`RohrError::UnsupportedLookupSource`].
    pub fn lookup(self, haystack: impl Into<Value>, key: impl Into<String>) -> Self {
        let haystack = haystack.into();
        let key = key.into();
        self.sequence("lookup", move |tree| {
            let Some(field) = tree.selected_field("lookup")? else {
                return Ok(Continuation::Done);
            };
            let needle = tree.field_value(&field);
            let hit = match &haystack {
                Value::Array(items) => items
                    .iter()
                    .find(|item| item.field(&key) == Some(needle))
                    .cloned(),
                Value::Object(entries) => entries
                    .get(&needle.stringify())
                    .filter(|entry| !entry.is_null())
                    .cloned(),
                other => return Err(RohrError::UnsupportedLookupSource(other.kind())),
            };
            match hit {
                Some(entry) => {
                    tree.write_field(&field, entry);
                }
                None => tree.report(&field, |property, scope| ValidationError::LookupFailed {
                    property,
                    scope,
                    key: Some(key),
                }),
            }
            Ok(Continuation::Done)
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: serde_json::Value) -> Value {
        Value::from(value)
    }

    fn table() -> Value {
        record(json!([{"id": 0, "v": "a"}, {"id": 1, "v": "b"}]))
    }

    #[tokio::test]
    async fn array_lookup_replaces_with_element() {
        let out = Pipeline::new(record(json!({"idx": 1})))
            .prop("idx")
            .lookup(table(), "id")
            .into_result()
            .await
            .unwrap();
        assert_eq!(out, record(json!({"idx": {"id": 1, "v": "b"}})));
    }

    #[tokio::test]
    async fn array_lookup_matches_zero() {
        let out = Pipeline::new(record(json!({"idx": 0})))
            .prop("idx")
            .lookup(table(), "id")
            .is_object()
            .into_result()
            .await
            .unwrap();
        assert_eq!(out.field("idx"), Some(&record(json!({"id": 0, "v": "a"}))));
    }

    #[tokio::test]
    async fn array_lookup_miss_records_key() {
        let res = Pipeline::new(record(json!({"idx": 5})))
            .prop("idx")
            .lookup(table(), "id")
            .settle()
            .await
            .unwrap();
        assert_eq!(
            res.errors,
            vec![ValidationError::LookupFailed {
                property: "idx".into(),
                scope: String::new(),
                key: Some("id".into()),
            }]
        );
        assert_eq!(res.record, record(json!({"idx": 5})));
    }

    #[tokio::test]
    async fn object_lookup_uses_stringified_value() {
        let out = Pipeline::new(record(json!({"code": 2})))
            .prop("code")
            .lookup(record(json!({"1": "one", "2": "two"})), "")
            .into_result()
            .await
            .unwrap();
        assert_eq!(out, record(json!({"code": "two"})));
    }

    #[tokio::test]
    async fn object_lookup_miss() {
        let err = Pipeline::new(record(json!({"code": "x"})))
            .prop("code")
            .lookup(record(json!({"y": 1})), "code")
            .into_result()
            .await
            .unwrap_err();
        assert_eq!(err.validation_errors().unwrap()[0].type_name(), "LookupFailed");
    }

    #[tokio::test]
    async fn scalar_haystack_is_misuse() {
        let err = Pipeline::new(record(json!({"code": 1})))
            .prop("code")
            .lookup("nope", "id")
            .resolve()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RohrError::UnsupportedLookupSource(rohr_types::Kind::String)
        ));
    }

    #[tokio::test]
    async fn lookup_on_missing_field_is_noop() {
        let out = Pipeline::new(record(json!({})))
            .optional("idx")
            .lookup("not even checked", "id")
            .into_result()
            .await
            .unwrap();
        assert_eq!(out, record(json!({})));
    }
}
