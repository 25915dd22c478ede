//! Actions and delays referenced by name from state nodes.

use crate::core::event::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Partial context deltas produced by actions.
///
/// `Value::Null` means "no change" for either context.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub p_context: Value,
    pub context: Value,
}

impl ActionResult {
    /// No change to either context.
    pub fn none() -> Self {
        Self::default()
    }

    /// Delta for the public context.
    pub fn context(delta: Value) -> Self {
        Self {
            p_context: Value::Null,
            context: delta,
        }
    }

    /// Delta for the private context.
    pub fn private(delta: Value) -> Self {
        Self {
            p_context: delta,
            context: Value::Null,
        }
    }

    pub fn with_context(mut self, delta: Value) -> Self {
        self.context = delta;
        self
    }

    pub fn with_private(mut self, delta: Value) -> Self {
        self.p_context = delta;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.p_context.is_null() && self.context.is_null()
    }
}

/// Named action computing context deltas from a snapshot.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::core::{Action, ActionResult, Event};
/// use serde_json::json;
///
/// let increment = Action::new(|_private, context, _event| {
///     let count = context["count"].as_i64().unwrap_or(0);
///     ActionResult::context(json!({ "count": count + 1 }))
/// });
///
/// let result = increment.execute(&json!({}), &json!({ "count": 1 }), &Event::new("INC"));
/// assert_eq!(result.context, json!({ "count": 2 }));
/// ```
#[derive(Clone)]
pub struct Action {
    run: Arc<dyn Fn(&Value, &Value, &Event) -> ActionResult + Send + Sync>,
}

impl Action {
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&Value, &Value, &Event) -> ActionResult + Send + Sync + 'static,
    {
        Self { run: Arc::new(run) }
    }

    /// Action that only touches the public context.
    pub fn assign<F>(assign: F) -> Self
    where
        F: Fn(&Value, &Event) -> Value + Send + Sync + 'static,
    {
        Self::new(move |_, context, event| ActionResult::context(assign(context, event)))
    }

    pub fn execute(&self, private: &Value, context: &Value, event: &Event) -> ActionResult {
        (self.run)(private, context, event)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action(..)")
    }
}

/// Named delay computed from a snapshot.
#[derive(Clone)]
pub struct Delay {
    compute: Arc<dyn Fn(&Value, &Value, &Event) -> Duration + Send + Sync>,
}

impl Delay {
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn(&Value, &Value, &Event) -> Duration + Send + Sync + 'static,
    {
        Self {
            compute: Arc::new(compute),
        }
    }

    /// Delay that ignores the snapshot.
    ///
    /// ```rust
    /// use mindset_statechart::core::{Delay, Event};
    /// use serde_json::json;
    /// use std::time::Duration;
    ///
    /// let delay = Delay::fixed(Duration::from_millis(60));
    /// assert_eq!(delay.evaluate(&json!({}), &json!({}), &Event::new("X")), Duration::from_millis(60));
    /// ```
    pub fn fixed(duration: Duration) -> Self {
        Self::new(move |_, _, _| duration)
    }

    pub fn evaluate(&self, private: &Value, context: &Value, event: &Event) -> Duration {
        (self.compute)(private, context, event)
    }
}

impl fmt::Debug for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Delay(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builders_fill_one_context_each() {
        let result = ActionResult::private(json!({ "secret": true })).with_context(json!({ "a": 1 }));
        assert_eq!(result.context, json!({ "a": 1 }));
        assert_eq!(result.p_context, json!({ "secret": true }));
        assert!(ActionResult::none().is_empty());
        assert!(!ActionResult::context(json!({ "a": 1 })).is_empty());
    }

    #[test]
    fn assign_reads_event_payload() {
        let set = Action::assign(|_, event| json!({ "value": event.payload["value"] }));
        let result = set.execute(
            &json!({}),
            &json!({}),
            &Event::with_payload("SET", json!({ "value": 9 })),
        );
        assert_eq!(result.context, json!({ "value": 9 }));
        assert!(result.p_context.is_null());
    }

    #[test]
    fn delay_reads_context() {
        let delay = Delay::new(|_, context, _| {
            Duration::from_millis(context["ms"].as_u64().unwrap_or(0))
        });
        assert_eq!(
            delay.evaluate(&json!({}), &json!({ "ms": 25 }), &Event::new("X")),
            Duration::from_millis(25)
        );
    }
}
