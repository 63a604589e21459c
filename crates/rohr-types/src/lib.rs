//! Shared types and errors for the Rohr record pipeline.
//!
//! This crate provides the foundational types used by the other Rohr crates:
//! - `Value`: the dynamic record tree the pipeline inspects and mutates
//! - `ValidationError`: one accumulated validation failure, as it goes over the wire
//! - `RohrError`: unified error type, including pipeline misuse

pub mod value;

pub use value::{Fields, Kind, Value};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ValidationError: recoverable failures accumulated by the pipeline
// ---------------------------------------------------------------------------

/// A validation failure recorded against a field.
///
/// Serializes as a map tagged by `type`, e.g.
/// `{"type":"InvalidPropertyType","property":"foo","scope":"","expectedType":"string","actualType":"number"}`.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ValidationError {
    #[error("property '{property}' is undefined in scope '{scope}'")]
    #[serde(rename_all = "camelCase")]
    UndefinedProperty { property: String, scope: String },

    #[error("property '{property}' in scope '{scope}' is {actual_type}, expected {expected_type}")]
    #[serde(rename_all = "camelCase")]
    InvalidPropertyType {
        property: String,
        scope: String,
        expected_type: Kind,
        actual_type: Kind,
    },

    #[error("cannot scope into non-composite property '{property}' in scope '{scope}'")]
    #[serde(rename_all = "camelCase")]
    InvalidScopeToNonObject { property: String, scope: String },

    #[error("transform of property '{property}' in scope '{scope}' was rejected: {error}")]
    #[serde(rename_all = "camelCase")]
    TransformPromiseRejected {
        property: String,
        scope: String,
        error: Value,
    },

    #[error("lookup of property '{property}' in scope '{scope}' found no match")]
    #[serde(rename_all = "camelCase")]
    LookupFailed {
        property: String,
        scope: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },

    #[error("cannot map over property '{property}' in scope '{scope}': {property_type} is not an array")]
    #[serde(rename_all = "camelCase")]
    MapOverNonArray {
        property: String,
        scope: String,
        property_type: Kind,
    },

    #[error("property '{property}' in scope '{scope}' failed validation")]
    #[serde(rename = "ValidationError", rename_all = "camelCase")]
    ValidationFailed {
        property: String,
        scope: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        err: Option<Value>,
    },

    #[error("cannot rescope property '{property}' in scope '{scope}' through non-composite '{segment}'")]
    #[serde(rename_all = "camelCase")]
    RescopeToNonObject {
        property: String,
        scope: String,
        segment: String,
    },

    #[error("property '{property}' cannot be written in scope '{scope}'")]
    #[serde(rename_all = "camelCase")]
    UnwritableProperty { property: String, scope: String },
}

impl ValidationError {
    /// The field the error was recorded against.
    pub fn property(&self) -> &str {
        match self {
            ValidationError::UndefinedProperty { property, .. }
            | ValidationError::InvalidPropertyType { property, .. }
            | ValidationError::InvalidScopeToNonObject { property, .. }
            | ValidationError::TransformPromiseRejected { property, .. }
            | ValidationError::LookupFailed { property, .. }
            | ValidationError::MapOverNonArray { property, .. }
            | ValidationError::ValidationFailed { property, .. }
            | ValidationError::RescopeToNonObject { property, .. }
            | ValidationError::UnwritableProperty { property, .. } => property,
        }
    }

    /// Dot-path of the scope the error was recorded in; empty for the root.
    pub fn scope(&self) -> &str {
        match self {
            ValidationError::UndefinedProperty { scope, .. }
            | ValidationError::InvalidPropertyType { scope, .. }
            | ValidationError::InvalidScopeToNonObject { scope, .. }
            | ValidationError::TransformPromiseRejected { scope, .. }
            | ValidationError::LookupFailed { scope, .. }
            | ValidationError::MapOverNonArray { scope, .. }
            | ValidationError::ValidationFailed { scope, .. }
            | ValidationError::RescopeToNonObject { scope, .. }
            | ValidationError::UnwritableProperty { scope, .. } => scope,
        }
    }

    /// The `type` tag this error serializes with.
    pub fn type_name(&self) -> &'static str {
        match self {
            ValidationError::UndefinedProperty { .. } => "UndefinedProperty",
            ValidationError::InvalidPropertyType { .. } => "InvalidPropertyType",
            ValidationError::InvalidScopeToNonObject { .. } => "InvalidScopeToNonObject",
            ValidationError::TransformPromiseRejected { .. } => "TransformPromiseRejected",
            ValidationError::LookupFailed { .. } => "LookupFailed",
            ValidationError::MapOverNonArray { .. } => "MapOverNonArray",
            ValidationError::ValidationFailed { .. } => "ValidationError",
            ValidationError::RescopeToNonObject { .. } => "RescopeToNonObject",
            ValidationError::UnwritableProperty { .. } => "UnwritableProperty",
        }
    }
}

// ---------------------------------------------------------------------------
// RohrError: unified error type
// ---------------------------------------------------------------------------

/// Unified error type for all Rohr crates.
#[derive(Debug, thiserror::Error)]
pub enum RohrError {
    // === Terminal outcome ===
    #[error("pipeline rejected with {} validation error(s)", .0.len())]
    Rejected(Vec<ValidationError>),

    // === Pipeline misuse ===
    #[error("{op}() called but not inspecting any property")]
    NoPropertySelected { op: &'static str },

    #[error("nested if_equals() calls are not allowed")]
    NestedMatchGate,

    #[error("end_if() called without preceding if_equals()")]
    EndIfWithoutIfEquals,

    #[error("{op}() called with dangling if_equals() without matching end_if()")]
    DanglingMatchGate { op: &'static str },

    #[error("cast_to() encountered unknown kind \"{0}\", expected \"integer\", \"float\", \"string\" or \"date\"")]
    UnknownCastKind(String),

    #[error("lookup() supports \"object\" and \"array\", not \"{0}\"")]
    UnsupportedLookupSource(Kind),
}

impl RohrError {
    /// Returns `true` if the error stems from a malformed call sequence rather
    /// than from the data flowing through the pipeline.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            RohrError::NoPropertySelected { .. }
                | RohrError::NestedMatchGate
                | RohrError::EndIfWithoutIfEquals
                | RohrError::DanglingMatchGate { .. }
                | RohrError::UnknownCastKind(_)
                | RohrError::UnsupportedLookupSource(_)
        )
    }

    /// The accumulated validation errors of a rejected pipeline.
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            RohrError::Rejected(errors) => Some(errors),
            _ => None,
        }
    }
}

/// A convenience alias for `Result<T, RohrError>`.
pub type Result<T> = std::result::Result<T, RohrError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invalid_property_type_wire_shape() {
        let err = ValidationError::InvalidPropertyType {
            property: "foo".into(),
            scope: String::new(),
            expected_type: Kind::String,
            actual_type: Kind::Number,
        };
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({
                "type": "InvalidPropertyType",
                "property": "foo",
                "scope": "",
                "expectedType": "string",
                "actualType": "number"
            })
        );
    }

    #[test]
    fn validation_failed_serializes_as_validation_error() {
        let err = ValidationError::ValidationFailed {
            property: "age".into(),
            scope: "person".into(),
            err: None,
        };
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"type": "ValidationError", "property": "age", "scope": "person"})
        );
        assert_eq!(err.type_name(), "ValidationError");
    }

    #[test]
    fn rejected_transform_carries_payload() {
        let err = ValidationError::TransformPromiseRejected {
            property: "foo".into(),
            scope: "a.b".into(),
            error: Value::from("boom"),
        };
        let wire = serde_json::to_value(&err).unwrap();
        assert_eq!(wire["error"], json!("boom"));
        assert_eq!(wire["scope"], json!("a.b"));
    }

    #[test]
    fn lookup_failed_deserializes_from_wire() {
        let err: ValidationError = serde_json::from_value(json!({
            "type": "LookupFailed",
            "property": "idx",
            "scope": "",
            "key": "id"
        }))
        .unwrap();
        assert_eq!(
            err,
            ValidationError::LookupFailed {
                property: "idx".into(),
                scope: String::new(),
                key: Some("id".into()),
            }
        );
    }

    #[test]
    fn accessors_cover_every_variant() {
        let err = ValidationError::MapOverNonArray {
            property: "list".into(),
            scope: "outer".into(),
            property_type: Kind::String,
        };
        assert_eq!(err.property(), "list");
        assert_eq!(err.scope(), "outer");
        assert_eq!(err.type_name(), "MapOverNonArray");
    }

    #[test]
    fn error_display_validation_error() {
        let err = ValidationError::UndefinedProperty {
            property: "foo".into(),
            scope: "bar".into(),
        };
        assert_eq!(err.to_string(), "property 'foo' is undefined in scope 'bar'");
    }

    #[test]
    fn error_display_rejected() {
        let err = RohrError::Rejected(vec![ValidationError::UndefinedProperty {
            property: "foo".into(),
            scope: String::new(),
        }]);
        assert_eq!(err.to_string(), "pipeline rejected with 1 validation error(s)");
    }

    #[test]
    fn error_display_no_property_selected() {
        let err = RohrError::NoPropertySelected { op: "is_string" };
        assert_eq!(
            err.to_string(),
            "is_string() called but not inspecting any property"
        );
    }

    #[test]
    fn programmer_errors_are_flagged() {
        assert!(RohrError::NestedMatchGate.is_programmer_error());
        assert!(RohrError::UnknownCastKind("bogus".into()).is_programmer_error());
        assert!(RohrError::UnsupportedLookupSource(Kind::String).is_programmer_error());
        assert!(!RohrError::Rejected(Vec::new()).is_programmer_error());
    }

    #[test]
    fn validation_errors_only_for_rejections() {
        assert_eq!(
            RohrError::Rejected(Vec::new()).validation_errors().map(<[_]>::len),
            Some(0)
        );
        assert!(RohrError::EndIfWithoutIfEquals.validation_errors().is_none());
    }

    #[test]
    fn unwritable_property_wire_shape() {
        let err = ValidationError::UnwritableProperty {
            property: "x".into(),
            scope: "list".into(),
        };
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"type": "UnwritableProperty", "property": "x", "scope": "list"})
        );
        assert_eq!(err.type_name(), "UnwritableProperty");
    }

    #[test]
    fn result_alias_works() {
        fn example() -> Result<u32> {
            Ok(42)
        }
        assert_eq!(example().unwrap(), 42);
    }
}
