//! Results of user callbacks that may or may not be available yet.

use std::future::Future;

use futures::future::{self, BoxFuture, FutureExt};
use rohr_types::Value;

/// What a user callback hands back to the pipeline.
///
/// `Immediate` values are applied on the spot. `Deferred` values suspend the
/// pipeline until they settle; an `Err` payload is a rejection and is recorded
/// in the resulting validation error.
pub enum Eventual<T> {
    Immediate(T),
    Deferred(BoxFuture<'static, Result<T, Value>>),
}

impl<T> Eventual<T> {
    /// Wrap a future that settles later.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, Value>> + Send + 'static,
    {
        Eventual::Deferred(future.boxed())
    }

    /// A deferred value that is already rejected with `payload`.
    pub fn rejected(payload: impl Into<Value>) -> Self
    where
        T: Send + 'static,
    {
        Eventual::Deferred(future::ready(Err(payload.into())).boxed())
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Eventual::Deferred(_))
    }

    /// View either variant as a future.
    pub(crate) fn into_future(self) -> BoxFuture<'static, Result<T, Value>>
    where
        T: Send + 'static,
    {
        match self {
            Eventual::Immediate(value) => future::ready(Ok(value)).boxed(),
            Eventual::Deferred(pending) => pending,
        }
    }
}

impl<T> From<T> for Eventual<T> {
    fn from(value: T) -> Self {
        Eventual::Immediate(value)
    }
}

impl<T> std::fmt::Debug for Eventual<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Eventual::Immediate(value) => f.debug_tuple("Immediate").field(value).finish(),
            Eventual::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn immediate_resolves_as_future() {
        let e: Eventual<Value> = Value::from(3).into();
        assert!(!e.is_deferred());
        assert_eq!(e.into_future().await, Ok(Value::from(3)));
    }

    #[tokio::test]
    async fn rejected_settles_with_payload() {
        let e: Eventual<bool> = Eventual::rejected("nope");
        assert!(e.is_deferred());
        assert_eq!(e.into_future().await, Err(Value::from("nope")));
    }

    #[tokio::test]
    async fn deferred_waits_for_inner_future() {
        let e = Eventual::deferred(async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Ok(Value::from("late"))
        });
        assert_eq!(e.into_future().await, Ok(Value::from("late")));
    }
}
