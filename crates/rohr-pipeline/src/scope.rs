//! Scope tree: the cursor state threaded through a pipeline.
//!
//! A [`ScopeTree`] owns the root record and a stack of [`ScopeNode`]s. The
//! bottom of the stack is the root scope; each entry above it was entered from
//! the entry below, which is its parent. Nodes never hold references into the
//! record. They hold the field path from the root record instead, so the tree
//! can be moved across suspension points freely.

use rohr_types::{Result, RohrError, ValidationError, Value};

use crate::config::PipelineConfig;

pub(crate) static NULL: Value = Value::Null;

/// State of the conditional match gate of a single scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchGate {
    #[default]
    Closed,
    Open { matched: bool },
}

impl MatchGate {
    pub fn is_open(&self) -> bool {
        matches!(self, MatchGate::Open { .. })
    }

    /// An open gate whose comparison failed skips field operations.
    pub fn suppresses(&self) -> bool {
        matches!(self, MatchGate::Open { matched: false })
    }
}

/// One level of nesting.
#[derive(Debug, Clone, Default)]
pub struct ScopeNode {
    /// Field names leading from the root record to this scope's record.
    pub(crate) path: Vec<String>,
    /// Field this scope was entered through; `None` for the root.
    pub(crate) label: Option<String>,
    pub(crate) selected: Option<String>,
    pub(crate) field_missing: bool,
    /// Entered on something that is not a composite; field operations no-op.
    pub(crate) invalid: bool,
    pub(crate) errors: Vec<ValidationError>,
    pub(crate) gate: MatchGate,
}

impl ScopeNode {
    fn child(&self, field: &str, invalid: bool) -> Self {
        let mut path = self.path.clone();
        path.push(field.to_string());
        Self {
            path,
            label: Some(field.to_string()),
            invalid,
            ..Self::default()
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn field_missing(&self) -> bool {
        self.field_missing
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn gate(&self) -> MatchGate {
        self.gate
    }
}

/// The root record plus the stack of scopes currently entered.
#[derive(Debug)]
pub struct ScopeTree {
    pub(crate) record: Value,
    pub(crate) scopes: Vec<ScopeNode>,
    /// First programmer error; once set, every later step is skipped.
    pub(crate) fault: Option<RohrError>,
    pub(crate) config: PipelineConfig,
}

impl ScopeTree {
    pub fn new(record: Value, config: PipelineConfig) -> Self {
        let root = ScopeNode {
            invalid: !record.is_composite(),
            ..ScopeNode::default()
        };
        Self {
            record,
            scopes: vec![root],
            fault: None,
            config,
        }
    }

    pub fn record(&self) -> &Value {
        &self.record
    }

    /// Nesting depth of the current scope; the root is at depth 0.
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    pub fn current(&self) -> &ScopeNode {
        &self.scopes[self.depth()]
    }

    pub(crate) fn current_mut(&mut self) -> &mut ScopeNode {
        let depth = self.depth();
        &mut self.scopes[depth]
    }

    /// Dot-path naming the current scope, empty for the root.
    pub fn scope_path(&self) -> String {
        self.scopes
            .iter()
            .filter_map(|s| s.label.as_deref())
            .collect::<Vec<_>>()
            .join(&self.config.scope_separator)
    }

    /// All errors not yet merged into the root, root first.
    pub fn pending_errors(&self) -> Vec<ValidationError> {
        self.scopes
            .iter()
            .flat_map(|s| s.errors.iter().cloned())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Record access
    // -----------------------------------------------------------------------

    fn resolve(&self, path: &[String]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.record, |value, key| value.field(key))
    }

    fn resolve_mut(&mut self, path: &[String]) -> Option<&mut Value> {
        path.iter()
            .try_fold(&mut self.record, |value, key| value.field_mut(key))
    }

    /// The composite the current scope inspects.
    pub fn container(&self) -> Option<&Value> {
        self.resolve(&self.current().path)
    }

    pub(crate) fn container_mut(&mut self) -> Option<&mut Value> {
        let path = self.current().path.clone();
        self.resolve_mut(&path)
    }

    /// Value of `field` in the current scope; `Null` when absent.
    pub fn field_value(&self, field: &str) -> &Value {
        self.container()
            .and_then(|c| c.field(field))
            .unwrap_or(&NULL)
    }

    /// Whether the current scope's record can take a value under `field`.
    pub fn writable(&self, field: &str) -> bool {
        self.container().is_some_and(|c| c.accepts_field(field))
    }

    /// Assign `field` in the current scope. A record that cannot hold it
    /// gets an `UnwritableProperty` error instead.
    pub(crate) fn write_field(&mut self, field: &str, value: Value) -> bool {
        let written = self
            .container_mut()
            .is_some_and(|c| c.set_field(field, value));
        if !written {
            tracing::warn!(field, scope = %self.scope_path(), "field could not be written");
            self.report(field, |property, scope| {
                ValidationError::UnwritableProperty { property, scope }
            });
        }
        written
    }

    pub(crate) fn remove_field(&mut self, field: &str) -> Option<Value> {
        self.container_mut().and_then(|c| c.remove_field(field))
    }

    // -----------------------------------------------------------------------
    // Preconditions and error recording
    // -----------------------------------------------------------------------

    /// Common preconditions of field-scoped operations.
    ///
    /// Returns `Ok(None)` when the operation must be skipped (gate closed on a
    /// failed comparison, invalid scope, missing field) and the selected field
    /// otherwise.
    pub(crate) fn selected_field(&self, op: &'static str) -> Result<Option<String>> {
        let node = self.current();
        if node.gate.suppresses() || node.invalid {
            return Ok(None);
        }
        let field = node
            .selected
            .clone()
            .ok_or(RohrError::NoPropertySelected { op })?;
        if node.field_missing {
            return Ok(None);
        }
        Ok(Some(field))
    }

    /// Whether operations that need no selection should be skipped.
    pub(crate) fn skipping(&self) -> bool {
        let node = self.current();
        node.gate.suppresses() || node.invalid
    }

    /// Record a validation error against `field` in the current scope.
    pub(crate) fn report(
        &mut self,
        field: &str,
        make: impl FnOnce(String, String) -> ValidationError,
    ) {
        let error = make(field.to_string(), self.scope_path());
        tracing::trace!(kind = error.type_name(), property = field, "validation error");
        self.current_mut().errors.push(error);
    }

    // -----------------------------------------------------------------------
    // Entering and leaving scopes
    // -----------------------------------------------------------------------

    /// Enter `field` of the current scope. `invalid` marks a detached scope
    /// whose field operations are no-ops.
    pub(crate) fn enter(&mut self, field: &str, invalid: bool) {
        let child = self.current().child(field, invalid);
        self.scopes.push(child);
    }

    /// Push a detached scope that adds nothing to the scope path.
    pub(crate) fn enter_unlabelled(&mut self) {
        let child = ScopeNode {
            path: self.current().path.clone(),
            invalid: true,
            ..ScopeNode::default()
        };
        self.scopes.push(child);
    }

    /// Leave the current scope, appending its errors to its parent's.
    ///
    /// Leaving a scope whose gate is still open is a programmer error.
    pub(crate) fn leave(&mut self, op: &'static str) -> Result<()> {
        if self.depth() == 0 {
            return Ok(());
        }
        if self.current().gate.is_open() {
            return Err(RohrError::DanglingMatchGate { op });
        }
        if let Some(child) = self.scopes.pop() {
            self.current_mut().errors.extend(child.errors);
        }
        Ok(())
    }

    /// Leave scopes until `depth` is the current one.
    pub(crate) fn unwind_to(&mut self, depth: usize, op: &'static str) -> Result<()> {
        while self.depth() > depth {
            self.leave(op)?;
        }
        Ok(())
    }

    /// Merge every scope into the root regardless of gate state.
    pub(crate) fn collapse(&mut self) {
        while let Some(child) = self.scopes.pop() {
            match self.scopes.last_mut() {
                Some(parent) => parent.errors.extend(child.errors),
                None => {
                    self.scopes.push(child);
                    break;
                }
            }
        }
    }

    /// Push the chain of scopes for `segments`, starting below the current
    /// scope and creating empty objects for absent or null fields.
    pub(crate) fn descend_creating(&mut self, segments: &[&str]) {
        for segment in segments {
            let container = self.container_mut();
            if let Some(container) = container {
                let absent = container.field(segment).map_or(true, Value::is_null);
                if absent {
                    container.set_field(segment, Value::empty_object());
                }
            }
            self.enter(segment, false);
        }
    }
}
