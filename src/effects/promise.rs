//! Asynchronous sources behind `promises` branches.

use crate::core::Event;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Future produced by a [`PromiseSource`]: `Ok` resolves, `Err` rejects.
pub type PromiseFuture = BoxFuture<'static, Result<Value, Value>>;

/// Named async operation invoked when a state with promises becomes active.
///
/// The source receives owned copies of both contexts and of the current
/// event, so it can run on the runtime without borrowing the interpreter.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::core::Event;
/// use mindset_statechart::effects::PromiseSource;
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let fetch = PromiseSource::new(|_private, context, _event| async move {
///     match context["id"].as_u64() {
///         Some(id) => Ok(json!({ "user": id })),
///         None => Err(json!("missing id")),
///     }
/// });
///
/// let result = fetch.call(json!({}), json!({ "id": 3 }), Event::new("LOAD")).await;
/// assert_eq!(result, Ok(json!({ "user": 3 })));
/// # }
/// ```
#[derive(Clone)]
pub struct PromiseSource {
    run: Arc<dyn Fn(Value, Value, Event) -> PromiseFuture + Send + Sync>,
}

impl PromiseSource {
    pub fn new<F, Fut>(run: F) -> Self
    where
        F: Fn(Value, Value, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        Self {
            run: Arc::new(move |private, context, event| run(private, context, event).boxed()),
        }
    }

    pub fn call(&self, private: Value, context: Value, event: Event) -> PromiseFuture {
        (self.run)(private, context, event)
    }
}

impl fmt::Debug for PromiseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PromiseSource(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn source_can_reject() {
        let failing = PromiseSource::new(|_, _, event| async move { Err(json!(event.kind)) });
        let result = failing.call(json!({}), json!({}), Event::new("BOOM")).await;
        assert_eq!(result, Err(json!("BOOM")));
    }

    #[tokio::test]
    async fn every_call_is_a_fresh_future() {
        let echo = PromiseSource::new(|_, context, _| async move { Ok(context) });
        let first = echo.call(json!({}), json!(1), Event::new("X"));
        let second = echo.call(json!({}), json!(2), Event::new("X"));
        assert_eq!(second.await, Ok(json!(2)));
        assert_eq!(first.await, Ok(json!(1)));
    }
}
