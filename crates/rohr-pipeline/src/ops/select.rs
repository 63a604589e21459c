//! Field selection and assignment: `prop`, `optional`, `set`, `value`, `nuke`.

use rohr_types::{ValidationError, Value};

use crate::engine::{write_eventual, Continuation, Pipeline};
use crate::eventual::Eventual;
use crate::scope::ScopeTree;

fn undefined(property: String, scope: String) -> ValidationError {
    ValidationError::UndefinedProperty { property, scope }
}

/// Point the current scope at `field`. Returns `false` if the scope skips
/// field operations.
fn select(tree: &mut ScopeTree, field: &str, missing: bool) -> bool {
    if tree.skipping() {
        return false;
    }
    let node = tree.current_mut();
    node.selected = Some(field.to_string());
    node.field_missing = missing;
    true
}

impl Pipeline {
    /// Select a required field. An absent or `null` field records
    /// `UndefinedProperty` and skips field operations until the next selection.
    pub fn prop(self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.sequence("prop", move |tree| {
            let node = tree.current();
            if node.gate.suppresses() {
                return Ok(Continuation::Done);
            }
            if node.invalid {
                // A scalar root can hold no fields at all.
                if tree.depth() == 0 {
                    tree.current_mut().selected = Some(field.clone());
                    tree.current_mut().field_missing = true;
                    tree.report(&field, undefined);
                }
                return Ok(Continuation::Done);
            }
            let missing = tree.field_value(&field).is_null();
            select(tree, &field, missing);
            if missing {
                tree.report(&field, undefined);
            }
            Ok(Continuation::Done)
        })
    }

    /// Select a field that may be absent. Absence only skips field operations.
    pub fn optional(self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.sequence("optional", move |tree| {
            let present = tree.container().is_some_and(|c| c.has_field(&field));
            select(tree, &field, !present);
            Ok(Continuation::Done)
        })
    }

    /// Select `field`, creating it if needed, and assign `value`.
    pub fn set(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.set_with(field, move || Eventual::Immediate(value))
    }

    /// Select `field`, creating it if needed, and assign what `provider` yields.
    pub fn set_with<F>(self, field: impl Into<String>, provider: F) -> Self
    where
        F: FnOnce() -> Eventual<Value> + Send + 'static,
    {
        let field = field.into();
        self.sequence("set", move |tree| {
            if !select(tree, &field, false) {
                return Ok(Continuation::Done);
            }
            Ok(write_eventual(tree, field, provider()))
        })
    }

    /// Replace the selected field's value.
    pub fn value(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.value_with(move || Eventual::Immediate(value))
    }

    /// Replace the selected field's value with what `provider` yields.
    pub fn value_with<F>(self, provider: F) -> Self
    where
        F: FnOnce() -> Eventual<Value> + Send + 'static,
    {
        self.sequence("value", move |tree| {
            let Some(field) = tree.selected_field("value")? else {
                return Ok(Continuation::Done);
            };
            Ok(write_eventual(tree, field, provider()))
        })
    }

    /// Delete the selected field from its record.
    pub fn nuke(self) -> Self {
        self.sequence("nuke", |tree| {
            let Some(field) = tree.selected_field("nuke")? else {
                return Ok(Continuation::Done);
            };
            tree.remove_field(&field);
            tree.current_mut().field_missing = true;
            Ok(Continuation::Done)
        })
    }
}
