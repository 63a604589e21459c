//! Type assertions on the selected field.

use rohr_types::{Kind, ValidationError};

use crate::engine::{Continuation, Pipeline};

impl Pipeline {
    fn assert_kind(self, op: &'static str, expected: Kind) -> Self {
        self.sequence(op, move |tree| {
            let Some(field) = tree.selected_field(op)? else {
                return Ok(Continuation::Done);
            };
            let actual = tree.field_value(&field).kind();
            if actual != expected {
                tree.report(&field, |property, scope| {
                    ValidationError::InvalidPropertyType {
                        property,
                        scope,
                        expected_type: expected,
                        actual_type: actual,
                    }
                });
            }
            Ok(Continuation::Done)
        })
    }

    pub fn is_string(self) -> Self {
        self.assert_kind("is_string", Kind::String)
    }

    /// Passes for any double except `NaN`.
    pub fn is_number(self) -> Self {
        self.assert_kind("is_number", Kind::Number)
    }

    pub fn is_boolean(self) -> Self {
        self.assert_kind("is_boolean", Kind::Boolean)
    }

    pub fn is_array(self) -> Self {
        self.assert_kind("is_array", Kind::Array)
    }

    /// Passes for maps only; arrays and dates are not objects here.
    pub fn is_object(self) -> Self {
        self.assert_kind("is_object", Kind::Object)
    }

    pub fn is_date(self) -> Self {
        self.assert_kind("is_date", Kind::Date)
    }
}
