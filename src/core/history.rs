//! State value history tracking.
//!
//! Every change of the active configuration is recorded with the event that
//! caused it, following the immutable style of the rest of the core.

use crate::core::value::StateValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of a single change of state value.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::core::{StateTransition, StateValue};
/// use chrono::Utc;
///
/// let transition = StateTransition {
///     from: StateValue::from("idle"),
///     to: StateValue::from("final"),
///     event: "NEXT".to_string(),
///     timestamp: Utc::now(),
/// };
/// assert_eq!(transition.event, "NEXT");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    /// The value being left
    pub from: StateValue,
    /// The value reached
    pub to: StateValue,
    /// Type of the event that triggered the change
    pub event: String,
    /// When the change was applied
    pub timestamp: DateTime<Utc>,
}

/// Ordered history of state value changes.
///
/// `record` returns a new history, the receiver is left untouched.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::core::{StateHistory, StateTransition, StateValue};
/// use chrono::Utc;
///
/// let history = StateHistory::new();
/// let history = history.record(StateTransition {
///     from: StateValue::from("idle"),
///     to: StateValue::from("busy"),
///     event: "START".to_string(),
///     timestamp: Utc::now(),
/// });
/// let history = history.record(StateTransition {
///     from: StateValue::from("busy"),
///     to: StateValue::from("done"),
///     event: "FINISH".to_string(),
///     timestamp: Utc::now(),
/// });
///
/// assert_eq!(history.get_path().len(), 3);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateHistory {
    transitions: Vec<StateTransition>,
}

impl StateHistory {
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Record a transition, returning a new history.
    pub fn record(&self, transition: StateTransition) -> Self {
        let mut transitions = self.transitions.clone();
        transitions.push(transition);
        Self { transitions }
    }

    /// Record a transition in place, dropping the oldest entries beyond `limit`.
    pub fn push_bounded(&mut self, transition: StateTransition, limit: Option<usize>) {
        self.transitions.push(transition);
        if let Some(limit) = limit {
            let overflow = self.transitions.len().saturating_sub(limit);
            if overflow > 0 {
                self.transitions.drain(..overflow);
            }
        }
    }

    /// Values traversed: the first `from`, then every `to`.
    pub fn get_path(&self) -> Vec<&StateValue> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.first() {
            path.push(&first.from);
        }
        for transition in &self.transitions {
            path.push(&transition.to);
        }
        path
    }

    /// Time between the first and the last recorded change.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.first(), self.transitions.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(from: &str, to: &str) -> StateTransition {
        StateTransition {
            from: StateValue::from(from),
            to: StateValue::from(to),
            event: "NEXT".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history = StateHistory::new();
        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
        assert!(history.duration().is_none());
    }

    #[test]
    fn record_is_immutable() {
        let history = StateHistory::new();
        let new_history = history.record(step("idle", "busy"));

        assert_eq!(history.len(), 0);
        assert_eq!(new_history.len(), 1);
    }

    #[test]
    fn get_path_returns_value_sequence() {
        let history = StateHistory::new()
            .record(step("idle", "busy"))
            .record(step("busy", "done"));

        let path = history.get_path();
        assert_eq!(
            path,
            vec![
                &StateValue::from("idle"),
                &StateValue::from("busy"),
                &StateValue::from("done"),
            ]
        );
    }

    #[test]
    fn push_bounded_drops_oldest() {
        let mut history = StateHistory::new();
        history.push_bounded(step("a", "b"), Some(2));
        history.push_bounded(step("b", "c"), Some(2));
        history.push_bounded(step("c", "d"), Some(2));

        assert_eq!(history.len(), 2);
        assert_eq!(history.transitions()[0].from, StateValue::from("b"));
    }

    #[test]
    fn duration_calculates_elapsed_time() {
        let first = step("a", "b");
        let mut second = step("b", "c");
        second.timestamp = first.timestamp + chrono::Duration::milliseconds(15);

        let history = StateHistory::new().record(first).record(second);
        assert_eq!(history.duration(), Some(Duration::from_millis(15)));
    }

    #[test]
    fn history_serializes_correctly() {
        let history = StateHistory::new().record(step("idle", "busy"));
        let json = serde_json::to_string(&history).unwrap();
        let deserialized: StateHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(history, deserialized);
    }
}
