//! Pipeline engine: the deferred execution spine and terminal resolution.
//!
//! Every operation is an effect on the [`ScopeTree`]. [`Pipeline::sequence`]
//! applies it right away while nothing is pending, and queues it behind the
//! pending step otherwise, so effects always run in invocation order.

use std::collections::VecDeque;
use std::future::IntoFuture;

use futures::future::{BoxFuture, FutureExt};
use rohr_types::{Result, RohrError, ValidationError, Value};

use crate::config::PipelineConfig;
use crate::eventual::Eventual;
use crate::scope::ScopeTree;

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// Completion applied to the tree once a suspended step settles.
pub(crate) type Settle = Box<dyn FnOnce(&mut ScopeTree) + Send>;

/// What an effect asks the spine to do next.
pub(crate) enum Continuation {
    Done,
    Suspend(BoxFuture<'static, Settle>),
}

impl Continuation {
    /// Suspend on `pending`, then hand its output to `settle`.
    pub(crate) fn after<T, F>(pending: BoxFuture<'static, T>, settle: F) -> Self
    where
        T: Send + 'static,
        F: FnOnce(&mut ScopeTree, T) + Send + 'static,
    {
        Continuation::Suspend(
            pending
                .map(move |output| -> Settle {
                    Box::new(move |tree: &mut ScopeTree| settle(tree, output))
                })
                .boxed(),
        )
    }
}

/// Write an eventual value into `field`, suspending if it is deferred.
///
/// A rejection is recorded as `TransformPromiseRejected` and the field is left
/// untouched.
pub(crate) fn write_eventual(
    tree: &mut ScopeTree,
    field: String,
    value: Eventual<Value>,
) -> Continuation {
    match value {
        Eventual::Immediate(value) => {
            tree.write_field(&field, value);
            Continuation::Done
        }
        Eventual::Deferred(pending) => Continuation::after(pending, move |tree, settled| {
            match settled {
                Ok(value) => {
                    tree.write_field(&field, value);
                }
                Err(payload) => tree.report(&field, |property, scope| {
                    ValidationError::TransformPromiseRejected {
                        property,
                        scope,
                        error: payload,
                    }
                }),
            }
        }),
    }
}

type Effect = Box<dyn FnOnce(&mut ScopeTree) -> Result<Continuation> + Send>;

/// A step waiting for the spine to settle.
struct Queued {
    op: &'static str,
    effect: Effect,
}

enum Spine {
    Ready(Box<ScopeTree>),
    /// `head` owns the tree until it settles; `queue` holds the steps called
    /// since, in invocation order.
    Pending {
        head: BoxFuture<'static, Box<ScopeTree>>,
        queue: VecDeque<Queued>,
    },
}

fn apply(mut tree: Box<ScopeTree>, op: &'static str, effect: Effect) -> Spine {
    if tree.fault.is_some() {
        return Spine::Ready(tree);
    }
    match effect(&mut *tree) {
        Ok(Continuation::Done) => Spine::Ready(tree),
        Ok(Continuation::Suspend(pending)) => {
            tracing::debug!(op, depth = tree.depth(), "step suspended");
            let head = async move {
                let settle = pending.await;
                settle(&mut *tree);
                tree
            }
            .boxed();
            Spine::Pending {
                head,
                queue: VecDeque::new(),
            }
        }
        Err(err) => {
            tracing::error!(op, error = %err, "pipeline misuse; skipping remaining steps");
            tree.fault = Some(err);
            Spine::Ready(tree)
        }
    }
}

/// Run the spine to completion. Queued steps are applied in one loop, so a
/// long chain behind a deferred step costs no stack.
async fn drain(mut spine: Spine) -> Box<ScopeTree> {
    loop {
        let (head, mut queue) = match spine {
            Spine::Ready(tree) => return tree,
            Spine::Pending { head, queue } => (head, queue),
        };
        let mut tree = head.await;
        spine = loop {
            let Some(step) = queue.pop_front() else {
                break Spine::Ready(tree);
            };
            match apply(tree, step.op, step.effect) {
                Spine::Ready(next) => tree = next,
                Spine::Pending { head, .. } => break Spine::Pending { head, queue },
            }
        };
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A fluent validation and transformation pipeline over one record.
///
/// Operations consume the pipeline and return it, so calls chain:
///
/// ```
/// # use rohr_pipeline::{CastKind, Eventual, Pipeline};
/// # use rohr_types::Value;
/// # futures::executor::block_on(async {
/// let record = Value::from(serde_json::json!({ "foo": "42" }));
/// let out = Pipeline::new(record)
///     .prop("foo")
///     .is_string()
///     .cast_to(CastKind::Integer)
///     .transform(|v, _, _| Eventual::Immediate(Value::from(v.as_f64().unwrap_or(0.0) * 2.0)))
///     .into_result()
///     .await
///     .unwrap();
/// assert_eq!(out.field("foo"), Some(&Value::from(84)));
/// # });
/// ```
pub struct Pipeline {
    spine: Spine,
}

/// Final record together with every validation error gathered on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub record: Value,
    pub errors: Vec<ValidationError>,
}

impl Resolution {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Pipeline {
    /// Start a pipeline rooted at `record` with the default configuration.
    pub fn new(record: impl Into<Value>) -> Self {
        Self::with_config(record, PipelineConfig::default())
    }

    pub fn with_config(record: impl Into<Value>, config: PipelineConfig) -> Self {
        Self {
            spine: Spine::Ready(Box::new(ScopeTree::new(record.into(), config))),
        }
    }

    /// Whether a deferred step is still outstanding.
    pub fn is_pending(&self) -> bool {
        matches!(self.spine, Spine::Pending { .. })
    }

    /// The scope tree, if no deferred step is outstanding.
    pub fn tree(&self) -> Option<&ScopeTree> {
        match &self.spine {
            Spine::Ready(tree) => Some(&**tree),
            Spine::Pending { .. } => None,
        }
    }

    /// Sequence one step on the spine.
    ///
    /// With nothing pending the effect runs now; otherwise it runs once every
    /// earlier step has settled.
    pub(crate) fn sequence<F>(self, op: &'static str, effect: F) -> Self
    where
        F: FnOnce(&mut ScopeTree) -> Result<Continuation> + Send + 'static,
    {
        let spine = match self.spine {
            Spine::Ready(tree) => {
                tracing::debug!(op, depth = tree.depth(), "step");
                apply(tree, op, Box::new(effect))
            }
            Spine::Pending { head, mut queue } => {
                tracing::trace!(op, queued = queue.len() + 1, "step queued");
                queue.push_back(Queued {
                    op,
                    effect: Box::new(effect),
                });
                Spine::Pending { head, queue }
            }
        };
        Self { spine }
    }

    // -----------------------------------------------------------------------
    // Side channels
    // -----------------------------------------------------------------------

    /// Observe the root record at this point of the pipeline.
    pub fn inspect<F>(self, f: F) -> Self
    where
        F: FnOnce(&Value) + Send + 'static,
    {
        self.sequence("inspect", move |tree| {
            f(tree.record());
            Ok(Continuation::Done)
        })
    }

    /// Observe every validation error gathered so far, root scope first.
    pub fn inspect_errors<F>(self, f: F) -> Self
    where
        F: FnOnce(&[ValidationError]) + Send + 'static,
    {
        self.sequence("inspect_errors", move |tree| {
            f(tree.pending_errors().as_slice());
            Ok(Continuation::Done)
        })
    }

    // -----------------------------------------------------------------------
    // Terminal resolution
    // -----------------------------------------------------------------------

    async fn finish(self, op: &'static str) -> Result<ScopeTree> {
        let mut tree = drain(self.spine).await;
        if let Some(fault) = tree.fault.take() {
            return Err(fault);
        }
        if tree.scopes.iter().any(|s| s.gate.is_open()) {
            return Err(RohrError::DanglingMatchGate { op });
        }
        tree.collapse();
        Ok(*tree)
    }

    /// Settle the pipeline: the record if no validation error was recorded,
    /// [`RohrError::Rejected`] with every error otherwise.
    #[doc(alias = "to_promise")]
    pub async fn into_result(self) -> Result<Value> {
        let mut tree = self.finish("into_result").await?;
        let errors = std::mem::take(&mut tree.scopes[0].errors);
        if errors.is_empty() {
            Ok(tree.record)
        } else {
            Err(RohrError::Rejected(errors))
        }
    }

    /// Settle the pipeline with the record, ignoring validation errors.
    ///
    /// Only misuse of the pipeline itself is returned as an error.
    pub async fn resolve(self) -> Result<Value> {
        Ok(self.finish("resolve").await?.record)
    }

    /// Settle the pipeline with both the record and its validation errors.
    pub async fn settle(self) -> Result<Resolution> {
        let mut tree = self.finish("settle").await?;
        let errors = std::mem::take(&mut tree.scopes[0].errors);
        Ok(Resolution {
            record: tree.record,
            errors,
        })
    }
}

impl IntoFuture for Pipeline {
    type Output = Result<Value>;
    type IntoFuture = BoxFuture<'static, Result<Value>>;

    fn into_future(self) -> Self::IntoFuture {
        self.into_result().boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use serde_json::json;

    fn record(value: serde_json::Value) -> Value {
        Value::from(value)
    }

    #[tokio::test]
    async fn empty_pipeline_resolves_to_record() {
        let out = Pipeline::new(record(json!({"foo": "bar"})))
            .into_result()
            .await
            .unwrap();
        assert_eq!(out, record(json!({"foo": "bar"})));
    }

    #[tokio::test]
    async fn synchronous_steps_never_suspend() {
        let p = Pipeline::new(record(json!({"foo": "bar"})))
            .prop("foo")
            .is_string();
        assert!(!p.is_pending());
        assert_eq!(p.tree().map(|t| t.depth()), Some(0));
    }

    #[tokio::test]
    async fn deferred_step_makes_later_steps_wait() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let p = Pipeline::new(record(json!({"foo": 1})))
            .prop("foo")
            .transform(|v, _, _| {
                let v = v.clone();
                Eventual::deferred(async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(Value::from(v.as_f64().unwrap_or(0.0) + 1.0))
                })
            })
            .inspect(move |r| log.lock().unwrap().push(r.field("foo").cloned()));
        assert!(p.is_pending());
        assert!(seen.lock().unwrap().is_empty());

        let out = p.into_result().await.unwrap();
        assert_eq!(out.field("foo"), Some(&Value::from(2)));
        assert_eq!(*seen.lock().unwrap(), vec![Some(Value::from(2))]);
    }

    #[tokio::test]
    async fn steps_run_in_invocation_order_across_suspensions() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c) = (order.clone(), order.clone(), order.clone());
        Pipeline::new(record(json!({"x": 0})))
            .prop("x")
            .transform(move |_, _, _| {
                a.lock().unwrap().push("slow");
                Eventual::deferred(async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(Value::from(1))
                })
            })
            .transform(move |_, _, _| {
                b.lock().unwrap().push("sync");
                Eventual::Immediate(Value::from(2))
            })
            .transform(move |_, _, _| {
                c.lock().unwrap().push("fast");
                Eventual::deferred(async { Ok(Value::from(3)) })
            })
            .resolve()
            .await
            .unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["slow", "sync", "fast"]);
    }

    #[tokio::test]
    async fn long_chain_behind_deferred_step_settles() {
        let mut p = Pipeline::new(record(json!({"n": 1})))
            .prop("n")
            .transform(|_, _, _| {
                Eventual::deferred(async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(Value::from(2))
                })
            });
        for _ in 0..20_000 {
            p = p.is_number();
        }
        let out = p.into_result().await.unwrap();
        assert_eq!(out, record(json!({"n": 2})));
    }

    #[tokio::test]
    async fn deferred_steps_inside_queue_keep_order() {
        let mut p = Pipeline::new(record(json!({"n": 0})))
            .prop("n")
            .value_with(|| Eventual::deferred(async { Ok(Value::from(0)) }));
        for _ in 0..500 {
            p = p.transform(|v, _, _| {
                let next = Value::from(v.as_f64().unwrap_or(f64::NAN) + 1.0);
                Eventual::deferred(async move { Ok(next) })
            });
            p = p.is_number();
        }
        let out = p.into_result().await.unwrap();
        assert_eq!(out, record(json!({"n": 500})));
    }

    #[tokio::test]
    async fn misuse_poisons_and_surfaces_at_resolution() {
        let err = Pipeline::new(record(json!({"foo": 1})))
            .is_string()
            .prop("foo")
            .is_string()
            .resolve()
            .await
            .unwrap_err();
        assert!(matches!(err, RohrError::NoPropertySelected { op: "is_string" }));
        assert!(err.is_programmer_error());
    }

    #[tokio::test]
    async fn resolve_ignores_validation_errors() {
        let out = Pipeline::new(record(json!({"foo": 4})))
            .prop("foo")
            .is_string()
            .resolve()
            .await
            .unwrap();
        assert_eq!(out, record(json!({"foo": 4})));
    }

    #[tokio::test]
    async fn settle_returns_record_and_errors() {
        let res = Pipeline::new(record(json!({"foo": 4})))
            .prop("foo")
            .is_string()
            .prop("missing")
            .settle()
            .await
            .unwrap();
        assert!(!res.is_valid());
        let kinds: Vec<_> = res.errors.iter().map(|e| e.type_name()).collect();
        assert_eq!(kinds, vec!["InvalidPropertyType", "UndefinedProperty"]);
        assert_eq!(res.record, record(json!({"foo": 4})));
    }

    #[tokio::test]
    async fn awaiting_pipeline_directly_rejects_on_errors() {
        let err = Pipeline::new(record(json!({})))
            .prop("nope")
            .await
            .unwrap_err();
        assert_eq!(err.validation_errors().map(<[_]>::len), Some(1));
    }

    #[tokio::test]
    async fn inspect_errors_sees_unmerged_child_errors() {
        let count = Arc::new(Mutex::new(0));
        let seen = count.clone();
        Pipeline::new(record(json!({"a": 1, "b": {"c": 2}})))
            .prop("a")
            .is_string()
            .prop("b")
            .scope()
            .prop("c")
            .is_string()
            .inspect_errors(move |errors| *seen.lock().unwrap() = errors.len())
            .resolve()
            .await
            .unwrap();
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn terminal_merges_open_scopes_into_root() {
        let err = Pipeline::new(record(json!({"a": {"b": {}}})))
            .prop("a")
            .scope()
            .prop("b")
            .scope()
            .prop("c")
            .into_result()
            .await
            .unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].scope(), "a.b");
    }
}
