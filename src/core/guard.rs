//! Guard predicates for controlling transitions.
//!
//! Guards are pure boolean functions over the private context, the public
//! context and the triggering event. Nodes reference them by name through a
//! [`GuardDef`] tree that can combine several predicates.

use crate::core::event::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Pure predicate that determines if a transition can execute.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::core::{Event, Guard};
/// use serde_json::json;
///
/// let is_ready = Guard::new(|_private, context, _event| context["ready"] == json!(true));
///
/// assert!(is_ready.check(&json!({}), &json!({ "ready": true }), &Event::new("GO")));
/// assert!(!is_ready.check(&json!({}), &json!({ "ready": false }), &Event::new("GO")));
/// ```
#[derive(Clone)]
pub struct Guard {
    predicate: Arc<dyn Fn(&Value, &Value, &Event) -> bool + Send + Sync>,
}

impl Guard {
    /// Create a guard from a pure predicate function.
    ///
    /// The predicate must be deterministic and thread-safe.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Value, &Value, &Event) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Check the guard against a context snapshot.
    pub fn check(&self, private: &Value, context: &Value, event: &Event) -> bool {
        (self.predicate)(private, context, event)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard(..)")
    }
}

/// Reference to one or several named predicates.
///
/// `And` and `Or` evaluate their operands left to right and short-circuit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardDef {
    Named(String),
    And(Vec<GuardDef>),
    Or(Vec<GuardDef>),
}

impl From<&str> for GuardDef {
    fn from(name: &str) -> Self {
        GuardDef::Named(name.to_string())
    }
}

impl GuardDef {
    pub fn named(name: impl Into<String>) -> Self {
        GuardDef::Named(name.into())
    }

    /// Evaluate the tree, resolving every name through `resolve`.
    ///
    /// ```rust
    /// use mindset_statechart::core::GuardDef;
    ///
    /// let guard = GuardDef::Or(vec![
    ///     GuardDef::named("closed"),
    ///     GuardDef::And(vec![GuardDef::named("open"), GuardDef::named("ready")]),
    /// ]);
    ///
    /// let result = guard.evaluate(&mut |name| name == "open" || name == "ready");
    /// assert!(result);
    /// ```
    pub fn evaluate<F>(&self, resolve: &mut F) -> bool
    where
        F: FnMut(&str) -> bool,
    {
        match self {
            GuardDef::Named(name) => resolve(name),
            GuardDef::And(guards) => guards.iter().all(|guard| guard.evaluate(&mut *resolve)),
            GuardDef::Or(guards) => guards.iter().any(|guard| guard.evaluate(&mut *resolve)),
        }
    }

    /// Every predicate name referenced by the tree.
    pub fn names(&self) -> Vec<&str> {
        match self {
            GuardDef::Named(name) => vec![name.as_str()],
            GuardDef::And(guards) | GuardDef::Or(guards) => {
                guards.iter().flat_map(GuardDef::names).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event() -> Event {
        Event::new("TICK")
    }

    #[test]
    fn guard_reads_both_contexts() {
        let guard = Guard::new(|private, context, _| {
            private["secret"] == json!(1) && context["count"] == json!(2)
        });

        assert!(guard.check(&json!({ "secret": 1 }), &json!({ "count": 2 }), &event()));
        assert!(!guard.check(&json!({ "secret": 0 }), &json!({ "count": 2 }), &event()));
    }

    #[test]
    fn guard_is_deterministic() {
        let guard = Guard::new(|_, context, _| context["n"].as_i64().unwrap_or(0) > 3);
        let context = json!({ "n": 5 });

        let result1 = guard.check(&json!({}), &context, &event());
        let result2 = guard.check(&json!({}), &context, &event());

        assert_eq!(result1, result2);
    }

    #[test]
    fn guard_can_inspect_event() {
        let guard = Guard::new(|_, _, event| event.payload["force"] == json!(true));
        let forced = Event::with_payload("TICK", json!({ "force": true }));

        assert!(guard.check(&json!({}), &json!({}), &forced));
        assert!(!guard.check(&json!({}), &json!({}), &event()));
    }

    #[test]
    fn and_short_circuits_left_to_right() {
        let guard = GuardDef::And(vec![GuardDef::named("no"), GuardDef::named("yes")]);
        let mut seen = Vec::new();

        let result = guard.evaluate(&mut |name| {
            seen.push(name.to_string());
            name == "yes"
        });

        assert!(!result);
        assert_eq!(seen, vec!["no".to_string()]);
    }

    #[test]
    fn or_short_circuits_left_to_right() {
        let guard = GuardDef::Or(vec![GuardDef::named("yes"), GuardDef::named("no")]);
        let mut seen = Vec::new();

        let result = guard.evaluate(&mut |name| {
            seen.push(name.to_string());
            name == "yes"
        });

        assert!(result);
        assert_eq!(seen, vec!["yes".to_string()]);
    }

    #[test]
    fn names_walks_the_tree() {
        let guard = GuardDef::And(vec![
            GuardDef::named("a"),
            GuardDef::Or(vec![GuardDef::named("b"), GuardDef::named("c")]),
        ]);
        assert_eq!(guard.names(), vec!["a", "b", "c"]);
    }
}
