//! The operation library.
//!
//! Each submodule adds methods to [`Pipeline`](crate::Pipeline). Every method
//! is a thin wrapper that hands an effect to the spine; field-scoped effects
//! start from [`ScopeTree::selected_field`](crate::scope::ScopeTree), which
//! applies the shared skip rules (closed gate, invalid scope, missing field).

pub mod assert;
pub mod cast;
pub mod gate;
pub mod lookup;
pub mod relocate;
pub mod scoping;
pub mod select;
pub mod transform;
