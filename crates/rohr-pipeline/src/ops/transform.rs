//! User-supplied logic per field: `transform`, `validate`, `map`.

use futures::future::{self, FutureExt};
use rohr_types::{ValidationError, Value};

use crate::engine::{write_eventual, Continuation, Pipeline};
use crate::eventual::Eventual;
use crate::scope::NULL;

fn validation_failed(err: Option<Value>) -> impl FnOnce(String, String) -> ValidationError {
    move |property, scope| ValidationError::ValidationFailed {
        property,
        scope,
        err,
    }
}

impl Pipeline {
    /// Replace the selected field with `f(value, enclosing record, root record)`.
    ///
    /// A deferred result suspends the pipeline; a rejection records
    /// `TransformPromiseRejected` and leaves the field as it was.
    pub fn transform<F>(self, f: F) -> Self
    where
        F: FnOnce(&Value, &Value, &Value) -> Eventual<Value> + Send + 'static,
    {
        self.sequence("transform", move |tree| {
            let Some(field) = tree.selected_field("transform")? else {
                return Ok(Continuation::Done);
            };
            let enclosing = tree.container().unwrap_or(&NULL);
            let result = f(tree.field_value(&field), enclosing, tree.record());
            Ok(write_eventual(tree, field, result))
        })
    }

    /// Check the selected field with a predicate.
    ///
    /// `false`, or a deferred rejection, records one `ValidationError`; the
    /// rejection payload is kept in `err`.
    pub fn validate<F>(self, f: F) -> Self
    where
        F: FnOnce(&Value) -> Eventual<bool> + Send + 'static,
    {
        self.sequence("validate", move |tree| {
            let Some(field) = tree.selected_field("validate")? else {
                return Ok(Continuation::Done);
            };
            match f(tree.field_value(&field)) {
                Eventual::Immediate(true) => Ok(Continuation::Done),
                Eventual::Immediate(false) => {
                    tree.report(&field, validation_failed(None));
                    Ok(Continuation::Done)
                }
                Eventual::Deferred(pending) => {
                    Ok(Continuation::after(pending, move |tree, verdict| match verdict {
                        Ok(true) => {}
                        Ok(false) => tree.report(&field, validation_failed(None)),
                        Err(payload) => tree.report(&field, validation_failed(Some(payload))),
                    }))
                }
            }
        })
    }

    /// Replace the selected array with `f` applied to each element.
    ///
    /// Deferred results are awaited together and reassembled in element order.
    /// A non-array records `MapOverNonArray`; any rejection records
    /// `TransformPromiseRejected`. Either way the field is left unchanged.
    pub fn map<F>(self, mut f: F) -> Self
    where
        F: FnMut(&Value) -> Eventual<Value> + Send + 'static,
    {
        self.sequence("map", move |tree| {
            let Some(field) = tree.selected_field("map")? else {
                return Ok(Continuation::Done);
            };
            let results: Vec<Eventual<Value>> = match tree.field_value(&field) {
                Value::Array(items) => items.iter().map(&mut f).collect(),
                other => {
                    let property_type = other.kind();
                    tree.report(&field, |property, scope| ValidationError::MapOverNonArray {
                        property,
                        scope,
                        property_type,
                    });
                    return Ok(Continuation::Done);
                }
            };

            if results.iter().all(|r| !r.is_deferred()) {
                let values = results
                    .into_iter()
                    .filter_map(|r| match r {
                        Eventual::Immediate(value) => Some(value),
                        Eventual::Deferred(_) => None,
                    })
                    .collect();
                tree.write_field(&field, Value::Array(values));
                return Ok(Continuation::Done);
            }

            let pending = future::join_all(results.into_iter().map(Eventual::into_future)).boxed();
            Ok(Continuation::after(pending, move |tree, settled| {
                match settled.into_iter().collect::<Result<Vec<_>, _>>() {
                    Ok(values) => {
                        tree.write_field(&field, Value::Array(values));
                    }
                    Err(payload) => tree.report(&field, |property, scope| {
                        ValidationError::TransformPromiseRejected {
                            property,
                            scope,
                            error: payload,
                        }
                    }),
                }
            }))
        })
    }
}
