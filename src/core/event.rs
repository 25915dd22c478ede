//! Events delivered to an interpreter.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event emitted when an interpreter starts.
pub const INIT_EVENT: &str = "machine$$init";

/// Synthetic event carrying the value of a resolved promise.
pub const THEN_EVENT: &str = "machine$$then";

/// Synthetic event carrying the reason of a rejected or timed out promise.
pub const CATCH_EVENT: &str = "machine$$catch";

/// An event with its type and an arbitrary JSON payload.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::core::Event;
/// use serde_json::json;
///
/// let next: Event = "NEXT".into();
/// assert_eq!(next.kind, "NEXT");
/// assert!(next.payload.is_null());
///
/// let typed = Event::with_payload("SET", json!({ "value": 3 }));
/// assert_eq!(typed.payload["value"], 3);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    pub(crate) fn init() -> Self {
        Self::new(INIT_EVENT)
    }

    /// True for the events the runtime emits itself.
    pub fn is_internal(&self) -> bool {
        self.kind.starts_with("machine$$")
    }
}

impl From<&str> for Event {
    fn from(kind: &str) -> Self {
        Event::new(kind)
    }
}

impl From<String> for Event {
    fn from(kind: String) -> Self {
        Event::new(kind)
    }
}
