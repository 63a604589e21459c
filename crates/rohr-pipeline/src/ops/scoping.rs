//! Entering and leaving nested scopes.

use rohr_types::{RohrError, ValidationError};

use crate::engine::{Continuation, Pipeline};

impl Pipeline {
    /// Enter the selected field as a nested scope.
    ///
    /// Entering a missing field, or anything inside an invalid scope, pushes a
    /// detached scope whose field operations are no-ops, so a nested block can
    /// be written unconditionally. A scalar field records
    /// `InvalidScopeToNonObject` and the pipeline stays in the current scope.
    pub fn scope(self) -> Self {
        self.sequence("scope", |tree| {
            let node = tree.current();
            if node.gate.suppresses() {
                return Ok(Continuation::Done);
            }
            if node.invalid {
                match node.selected.clone() {
                    Some(label) => tree.enter(&label, true),
                    None => tree.enter_unlabelled(),
                }
                return Ok(Continuation::Done);
            }
            let field = node
                .selected
                .clone()
                .ok_or(RohrError::NoPropertySelected { op: "scope" })?;
            if node.field_missing {
                tree.enter(&field, true);
                return Ok(Continuation::Done);
            }
            if !tree.field_value(&field).is_composite() {
                tree.report(&field, |property, scope| {
                    ValidationError::InvalidScopeToNonObject { property, scope }
                });
                return Ok(Continuation::Done);
            }
            tree.enter(&field, false);
            Ok(Continuation::Done)
        })
    }

    /// Return to the enclosing scope, handing it this scope's errors.
    /// A no-op at the root.
    pub fn scope_back(self) -> Self {
        self.sequence("scope_back", |tree| {
            if !tree.current().gate.suppresses() {
                tree.leave("scope_back")?;
            }
            Ok(Continuation::Done)
        })
    }

    /// Return to the root scope, merging errors on the way up.
    pub fn root_scope(self) -> Self {
        self.sequence("root_scope", |tree| {
            if !tree.current().gate.suppresses() {
                tree.unwind_to(0, "root_scope")?;
            }
            Ok(Continuation::Done)
        })
    }
}
