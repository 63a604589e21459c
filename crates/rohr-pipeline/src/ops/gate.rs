//! Conditional match gate: `if_equals` ... `end_if`.
//!
//! While a gate is open on a failed comparison, field operations of that scope
//! are skipped, so a conditional block never changes the shape of the chain.

use rohr_types::{Result, RohrError, Value};

use crate::engine::{Continuation, Pipeline};
use crate::eventual::Eventual;
use crate::scope::{MatchGate, ScopeTree};

/// Open the gate of the current scope. Returns the field to compare, or
/// `None` when the gate was opened on a failed match outright.
fn open_gate(tree: &mut ScopeTree) -> Result<Option<String>> {
    let node = tree.current();
    if node.gate.is_open() {
        return Err(RohrError::NestedMatchGate);
    }
    let field = if node.invalid {
        None
    } else {
        let field = node
            .selected
            .clone()
            .ok_or(RohrError::NoPropertySelected { op: "if_equals" })?;
        (!node.field_missing).then_some(field)
    };
    if field.is_none() {
        tree.current_mut().gate = MatchGate::Open { matched: false };
    }
    Ok(field)
}

impl Pipeline {
    /// Open a conditional block that runs only if the selected field equals
    /// `expected`. Must be closed with [`Pipeline::end_if`].
    pub fn if_equals(self, expected: impl Into<Value>) -> Self {
        let expected = expected.into();
        self.if_equals_with(move |_| Eventual::Immediate(expected))
    }

    /// Like [`Pipeline::if_equals`], comparing against what `f` yields for the
    /// field's value. A rejected comparand counts as a failed match.
    pub fn if_equals_with<F>(self, f: F) -> Self
    where
        F: FnOnce(&Value) -> Eventual<Value> + Send + 'static,
    {
        self.sequence("if_equals", move |tree| {
            let Some(field) = open_gate(tree)? else {
                return Ok(Continuation::Done);
            };
            match f(tree.field_value(&field)) {
                Eventual::Immediate(expected) => {
                    let matched = *tree.field_value(&field) == expected;
                    tree.current_mut().gate = MatchGate::Open { matched };
                    Ok(Continuation::Done)
                }
                Eventual::Deferred(pending) => {
                    tree.current_mut().gate = MatchGate::Open { matched: false };
                    Ok(Continuation::after(pending, move |tree, settled| {
                        let matched = match settled {
                            Ok(expected) => *tree.field_value(&field) == expected,
                            Err(payload) => {
                                tracing::warn!(
                                    field = %field,
                                    payload = %payload,
                                    "if_equals comparand rejected; treating as no match"
                                );
                                false
                            }
                        };
                        tree.current_mut().gate = MatchGate::Open { matched };
                    }))
                }
            }
        })
    }

    /// Close the conditional block opened by the last `if_equals`.
    pub fn end_if(self) -> Self {
        self.sequence("end_if", |tree| {
            if !tree.current().gate.is_open() {
                return Err(RohrError::EndIfWithoutIfEquals);
            }
            tree.current_mut().gate = MatchGate::Closed;
            Ok(Continuation::Done)
        })
    }
}
