//! Resolved runtime description of a statechart.
//!
//! Nodes are plain data. Actions, predicates, delays, promises and child
//! machines are referenced by name and looked up in the interpreter's options
//! when they are needed, so implementations can be swapped while running.

use crate::core::guard::GuardDef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of a state node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Leaf state without children
    #[default]
    Atomic,
    /// Exactly one child active at a time
    Compound,
    /// Every child active concurrently
    Parallel,
}

/// A candidate transition.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionDef {
    /// Absolute target address, `None` for targetless (actions only) transitions
    pub target: Option<String>,
    /// Guard that must pass for the transition to be chosen
    pub guard: Option<GuardDef>,
    /// Action names executed when the transition is taken
    pub actions: Vec<String>,
    pub description: Option<String>,
}

/// Transitions fired once a named delay has elapsed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DelayedTransition {
    /// Delay name resolved through the options
    pub delay: String,
    pub transitions: Vec<TransitionDef>,
}

/// Actions run when a promise settles, whichever way it settles.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FinallyDef {
    pub guard: Option<GuardDef>,
    pub actions: Vec<String>,
}

/// An asynchronous source whose settlement drives a transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromiseDef {
    /// Promise name resolved through the options
    pub src: String,
    /// Delay name bounding the promise, defaults to the runtime maximum
    #[serde(default)]
    pub max: Option<String>,
    #[serde(default)]
    pub then: Vec<TransitionDef>,
    #[serde(default)]
    pub catch: Vec<TransitionDef>,
    #[serde(default)]
    pub finally: Vec<FinallyDef>,
}

/// One action specification of a recurring activity.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityDef {
    pub guard: Option<GuardDef>,
    pub actions: Vec<String>,
}

/// Resolved state node.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::core::{Node, NodeType};
///
/// let leaf = Node::atomic();
/// assert_eq!(leaf.node_type, NodeType::Atomic);
/// assert!(leaf.states.is_empty());
/// ```
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub description: Option<String>,
    /// Key of the initial child of a compound node
    pub initial: Option<String>,
    pub entry: Vec<String>,
    pub exit: Vec<String>,
    /// Event type to candidate transitions, first passing guard wins
    pub on: BTreeMap<String, Vec<TransitionDef>>,
    pub always: Vec<TransitionDef>,
    pub after: Vec<DelayedTransition>,
    pub promises: Vec<PromiseDef>,
    /// Delay name to the action specifications run on every tick
    pub activities: BTreeMap<String, Vec<ActivityDef>>,
    pub tags: Vec<String>,
    pub states: BTreeMap<String, Node>,
}

impl Node {
    pub fn atomic() -> Self {
        Self::default()
    }

    pub fn compound(initial: impl Into<String>) -> Self {
        Self {
            node_type: NodeType::Compound,
            initial: Some(initial.into()),
            ..Self::default()
        }
    }

    pub fn parallel() -> Self {
        Self {
            node_type: NodeType::Parallel,
            ..Self::default()
        }
    }

    pub fn is_atomic(&self) -> bool {
        self.node_type == NodeType::Atomic
    }

    pub fn is_parallel(&self) -> bool {
        self.node_type == NodeType::Parallel
    }

    /// True when the node owns delayed or promise transitions.
    pub fn has_branches(&self) -> bool {
        !self.after.is_empty() || !self.promises.is_empty()
    }

    /// Copy of the node without its children.
    pub fn without_children(&self) -> Self {
        Self {
            node_type: self.node_type,
            description: self.description.clone(),
            initial: self.initial.clone(),
            entry: self.entry.clone(),
            exit: self.exit.clone(),
            on: self.on.clone(),
            always: self.always.clone(),
            after: self.after.clone(),
            promises: self.promises.clone(),
            activities: self.activities.clone(),
            tags: self.tags.clone(),
            states: BTreeMap::new(),
        }
    }

    /// Key of the child entered by default.
    pub fn initial_child(&self) -> Option<&str> {
        match &self.initial {
            Some(key) if self.states.contains_key(key) => Some(key.as_str()),
            _ => self.states.keys().next().map(String::as_str),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_child_falls_back_to_first_key() {
        let mut node = Node::compound("missing");
        node.states.insert("b".to_string(), Node::atomic());
        node.states.insert("a".to_string(), Node::atomic());
        assert_eq!(node.initial_child(), Some("a"));

        node.initial = Some("b".to_string());
        assert_eq!(node.initial_child(), Some("b"));
    }

    #[test]
    fn without_children_keeps_definition() {
        let mut node = Node::compound("idle");
        node.entry.push("log".to_string());
        node.states.insert("idle".to_string(), Node::atomic());

        let flat = node.without_children();
        assert!(flat.states.is_empty());
        assert_eq!(flat.entry, vec!["log".to_string()]);
        assert_eq!(flat.initial.as_deref(), Some("idle"));
    }

    #[test]
    fn node_serializes_with_type_tag() {
        let node = Node::parallel();
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "parallel");
        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }
}
