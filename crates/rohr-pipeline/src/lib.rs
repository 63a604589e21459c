//! Fluent validation and transformation pipelines over in-memory records.
//!
//! A [`Pipeline`] wraps one record and chains operations on it: select a
//! field, assert its kind, cast or transform it, descend into nested records,
//! gate a block on a comparison, move values around. Validation failures are
//! collected per scope and handed back together at resolution; misuse of the
//! chain itself (an operation with nothing selected, unbalanced gates) is
//! returned as an error of its own.
//!
//! User callbacks return [`Eventual`] values. A deferred value suspends the
//! chain, and every later operation waits for it, so synchronous and
//! asynchronous pipelines read the same.

pub mod config;
pub mod engine;
pub mod eventual;
pub mod ops;
pub mod scope;

pub use config::PipelineConfig;
pub use engine::{Pipeline, Resolution};
pub use eventual::Eventual;
pub use ops::cast::{parse_float, parse_int, to_date, CastKind};
pub use scope::{MatchGate, ScopeNode, ScopeTree};

pub use rohr_types::{Kind, Result, RohrError, ValidationError, Value};
