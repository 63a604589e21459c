//! Moving and copying the selected field: `rename`, `rescope`, `broadcast`.

use rohr_types::{ValidationError, Value};

use crate::engine::{Continuation, Pipeline};

/// First segment of `segments`, walked from `start`, that stops `field` from
/// landing at the end of the walk. Absent or `null` segments are created
/// later, so nothing below them can block.
fn blocking_segment(start: &Value, segments: &[&str], field: &str) -> Option<String> {
    let mut current = start;
    for segment in segments {
        if !current.accepts_field(segment) {
            return Some(segment.to_string());
        }
        match current.field(segment) {
            None | Some(Value::Null) => return None,
            Some(next) if next.is_composite() => current = next,
            Some(_) => return Some(segment.to_string()),
        }
    }
    match segments.last() {
        Some(last) if !current.accepts_field(field) => Some(last.to_string()),
        _ => None,
    }
}

impl Pipeline {
    /// Move the selected field's value to `name` in the same record and select
    /// it there. A record that cannot hold `name` (an array and a non-index
    /// name) keeps the value where it is and records `UnwritableProperty`.
    pub fn rename(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.sequence("rename", move |tree| {
            let Some(field) = tree.selected_field("rename")? else {
                return Ok(Continuation::Done);
            };
            if !tree.writable(&name) {
                tree.report(&name, |property, scope| {
                    ValidationError::UnwritableProperty { property, scope }
                });
                return Ok(Continuation::Done);
            }
            if let Some(value) = tree.remove_field(&field) {
                tree.write_field(&name, value);
            }
            tree.current_mut().selected = Some(name);
            Ok(Continuation::Done)
        })
    }

    /// Move the selected field into the nested record at `path`, creating the
    /// records on the way, and continue in the scope of the innermost one.
    ///
    /// The walk starts at the root record unless the pipeline was configured
    /// otherwise; see [`Pipeline::rescope_from`].
    pub fn rescope(self, path: impl Into<String>) -> Self {
        self.rescope_with(path.into(), None)
    }

    /// [`Pipeline::rescope`] with an explicit starting point: the root record
    /// if `from_root`, the current scope's record otherwise.
    pub fn rescope_from(self, path: impl Into<String>, from_root: bool) -> Self {
        self.rescope_with(path.into(), Some(from_root))
    }

    fn rescope_with(self, path: String, from_root: Option<bool>) -> Self {
        self.sequence("rescope", move |tree| {
            let Some(field) = tree.selected_field("rescope")? else {
                return Ok(Continuation::Done);
            };
            let from_root = from_root.unwrap_or(tree.config.rescope_from_root);
            let separator = tree.config.scope_separator.clone();
            let segments: Vec<&str> = path.split(separator.as_str()).collect();

            let start = if from_root {
                Some(tree.record())
            } else {
                tree.container()
            };
            if let Some(segment) = start.and_then(|s| blocking_segment(s, &segments, &field)) {
                tree.report(&field, |property, scope| {
                    ValidationError::RescopeToNonObject {
                        property,
                        scope,
                        segment,
                    }
                });
                return Ok(Continuation::Done);
            }

            let value = tree.remove_field(&field).unwrap_or_default();
            tree.current_mut().field_missing = true;
            if from_root {
                tree.unwind_to(0, "rescope")?;
            }
            tree.descend_creating(&segments);
            let node = tree.current_mut();
            node.selected = Some(field.clone());
            node.field_missing = false;
            tree.write_field(&field, value);
            Ok(Continuation::Done)
        })
    }

    /// Copy the selected field's value into each of `fields` in the same
    /// record. The selection stays where it is.
    pub fn broadcast<I>(self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.sequence("broadcast", move |tree| {
            let Some(field) = tree.selected_field("broadcast")? else {
                return Ok(Continuation::Done);
            };
            let value = tree.field_value(&field).clone();
            for target in &fields {
                tree.write_field(target, value.clone());
            }
            Ok(Continuation::Done)
        })
    }
}
