//! State values and the pure algebra that moves them.
//!
//! A state value describes which leaves of a statechart are active. A compound
//! state with a single active atomic child collapses to that child's key, a
//! parallel state maps every region to its own value.

use crate::config::DEFAULT_DELIMITER;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Serializable representation of the active configuration.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::core::StateValue;
/// use std::collections::BTreeMap;
///
/// let idle = StateValue::from("idle");
/// assert_eq!(idle.leaf_paths(), vec!["/idle".to_string()]);
///
/// let mut regions = BTreeMap::new();
/// regions.insert("a".to_string(), StateValue::from("x"));
/// regions.insert("b".to_string(), StateValue::from("y"));
/// let parallel = StateValue::Branch(regions);
/// assert_eq!(parallel.leaf_paths(), vec!["/a/x".to_string(), "/b/y".to_string()]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    /// Key of the single active child
    Leaf(String),
    /// Region or child key mapped to its nested value
    Branch(BTreeMap<String, StateValue>),
}

impl Default for StateValue {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::Leaf(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        StateValue::Leaf(value)
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl StateValue {
    /// The empty value (`{}`).
    pub fn empty() -> Self {
        StateValue::Branch(BTreeMap::new())
    }

    /// True for `""` and `{}`.
    pub fn is_empty(&self) -> bool {
        match self {
            StateValue::Leaf(key) => key.is_empty(),
            StateValue::Branch(map) => map.is_empty(),
        }
    }

    /// Absolute paths of every active leaf, in key order.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_leaves(self, "", &mut out);
        out
    }

    /// True when `path` is an active leaf or an ancestor of one.
    pub fn contains_path(&self, path: &str) -> bool {
        let path = normalize(path);
        if path == DEFAULT_DELIMITER {
            return true;
        }
        self.leaf_paths()
            .iter()
            .any(|leaf| is_same_or_ancestor(&path, leaf))
    }

    /// Rebuild a value from a set of absolute leaf paths.
    ///
    /// ```rust
    /// use mindset_statechart::core::StateValue;
    ///
    /// let value = StateValue::from_paths(["/working/fetch/idle"]);
    /// assert_eq!(value.to_string(), r#"{"working":{"fetch":"idle"}}"#);
    /// ```
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let mut trie = Trie::default();
        for path in paths {
            trie.insert(path.as_ref());
        }
        trie.to_value()
    }
}

/// Compute the value reached from `from` when `target` becomes active.
///
/// Only the deepest active branch that contains the target's parent is
/// replaced, so sibling regions of a parallel state keep their value. When no
/// active branch contains the target the value is replaced wholesale.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::core::{next_value, StateValue};
///
/// let from = StateValue::from_paths(["/a/x", "/b/y"]);
/// let next = next_value(&from, Some("/a/z"));
/// assert_eq!(next, StateValue::from_paths(["/a/z", "/b/y"]));
///
/// assert_eq!(next_value(&StateValue::from(""), Some("/a")), StateValue::empty());
/// assert_eq!(next_value(&from, None), from);
/// ```
pub fn next_value(from: &StateValue, target: Option<&str>) -> StateValue {
    if from.is_empty() {
        return StateValue::empty();
    }
    let target = match target {
        Some(target) if !target.trim().is_empty() => normalize(target),
        _ => return from.clone(),
    };

    let parent = parent_path(&target);
    let leaves = from.leaf_paths();
    let anchor = leaves
        .iter()
        .flat_map(|leaf| prefixes(leaf))
        .filter(|prefix| is_same_or_ancestor(prefix, &parent))
        .max_by_key(|prefix| prefix.len());

    match anchor {
        Some(anchor) => {
            let mut kept: Vec<String> = leaves
                .into_iter()
                .filter(|leaf| !is_same_or_ancestor(&anchor, leaf))
                .collect();
            kept.push(target);
            StateValue::from_paths(kept)
        }
        None => StateValue::from_paths([target]),
    }
}

/// Ensure a leading delimiter and drop a trailing one.
pub(crate) fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches(DEFAULT_DELIMITER);
    if trimmed.is_empty() {
        DEFAULT_DELIMITER.to_string()
    } else if trimmed.starts_with(DEFAULT_DELIMITER) {
        trimmed.to_string()
    } else {
        format!("{DEFAULT_DELIMITER}{trimmed}")
    }
}

/// Parent address of an absolute path. The parent of a root child is `""`.
pub(crate) fn parent_path(path: &str) -> String {
    match path.rfind(DEFAULT_DELIMITER) {
        Some(index) => path[..index].to_string(),
        None => String::new(),
    }
}

/// `descendant` equals `ancestor` or lives below it.
pub(crate) fn is_same_or_ancestor(ancestor: &str, descendant: &str) -> bool {
    if ancestor.is_empty() || ancestor == DEFAULT_DELIMITER {
        return true;
    }
    descendant == ancestor
        || (descendant.starts_with(ancestor)
            && descendant[ancestor.len()..].starts_with(DEFAULT_DELIMITER))
}

fn prefixes(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for segment in path.split(DEFAULT_DELIMITER).filter(|s| !s.is_empty()) {
        current.push_str(DEFAULT_DELIMITER);
        current.push_str(segment);
        out.push(current.clone());
    }
    out
}

fn collect_leaves(value: &StateValue, prefix: &str, out: &mut Vec<String>) {
    match value {
        StateValue::Leaf(key) if key.is_empty() => {
            if !prefix.is_empty() {
                out.push(prefix.to_string());
            }
        }
        StateValue::Leaf(key) => out.push(format!("{prefix}{DEFAULT_DELIMITER}{key}")),
        StateValue::Branch(map) if map.is_empty() => {
            if !prefix.is_empty() {
                out.push(prefix.to_string());
            }
        }
        StateValue::Branch(map) => {
            for (key, child) in map {
                collect_leaves(child, &format!("{prefix}{DEFAULT_DELIMITER}{key}"), out);
            }
        }
    }
}

#[derive(Default)]
struct Trie(BTreeMap<String, Trie>);

impl Trie {
    fn insert(&mut self, path: &str) {
        let mut node = self;
        for segment in path.split(DEFAULT_DELIMITER).filter(|s| !s.is_empty()) {
            node = node.0.entry(segment.to_string()).or_default();
        }
    }

    fn to_value(&self) -> StateValue {
        if self.0.len() == 1 {
            if let Some((key, child)) = self.0.iter().next() {
                if child.0.is_empty() {
                    return StateValue::Leaf(key.clone());
                }
            }
        }
        StateValue::Branch(
            self.0
                .iter()
                .map(|(key, child)| (key.clone(), child.to_value()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parallel() -> StateValue {
        StateValue::from_paths(["/a/x", "/b/y"])
    }

    #[test]
    fn empty_source_yields_empty_value() {
        assert_eq!(
            next_value(&StateValue::from(""), Some("/anything")),
            StateValue::empty()
        );
        assert_eq!(
            next_value(&StateValue::empty(), Some("/anything")),
            StateValue::empty()
        );
    }

    #[test]
    fn missing_target_is_identity() {
        let value = parallel();
        assert_eq!(next_value(&value, None), value);
        assert_eq!(next_value(&value, Some("")), value);
    }

    #[test]
    fn leaf_extended_by_target_recomposes() {
        let next = next_value(&StateValue::from("working"), Some("/working/fetch/idle"));
        let mut fetch = BTreeMap::new();
        fetch.insert("fetch".to_string(), StateValue::from("idle"));
        let mut root = BTreeMap::new();
        root.insert("working".to_string(), StateValue::Branch(fetch));
        assert_eq!(next, StateValue::Branch(root));
    }

    #[test]
    fn unrelated_leaf_is_replaced() {
        assert_eq!(
            next_value(&StateValue::from("idle"), Some("/final")),
            StateValue::from("final")
        );
    }

    #[test]
    fn sibling_region_is_untouched() {
        let next = next_value(&parallel(), Some("/a/z"));
        match &next {
            StateValue::Branch(map) => {
                assert_eq!(map.get("a"), Some(&StateValue::from("z")));
                assert_eq!(map.get("b"), Some(&StateValue::from("y")));
            }
            other => panic!("expected branch, got {other}"),
        }
    }

    #[test]
    fn target_outside_every_branch_replaces_wholesale() {
        let from = StateValue::from_paths(["/p/a/x", "/p/b/y"]);
        assert_eq!(next_value(&from, Some("/q")), StateValue::from("q"));
    }

    #[test]
    fn nested_sibling_switch_keeps_ancestors() {
        let from = StateValue::from_paths(["/working/fetch/idle"]);
        let next = next_value(&from, Some("/working/fetch/busy"));
        assert_eq!(next, StateValue::from_paths(["/working/fetch/busy"]));
    }

    #[test]
    fn atomic_regions_are_empty_branches() {
        let value = StateValue::from_paths(["/p/a", "/p/b"]);
        assert_eq!(value.to_string(), r#"{"p":{"a":{},"b":{}}}"#);
        assert_eq!(value.leaf_paths(), vec!["/p/a", "/p/b"]);
    }

    #[test]
    fn contains_path_checks_ancestors() {
        let value = StateValue::from_paths(["/working/fetch/idle"]);
        assert!(value.contains_path("/"));
        assert!(value.contains_path("/working"));
        assert!(value.contains_path("/working/fetch/idle"));
        assert!(!value.contains_path("/work"));
        assert!(!value.contains_path("/working/fetch/busy"));
    }

    #[test]
    fn relative_target_is_normalized() {
        assert_eq!(
            next_value(&StateValue::from("idle"), Some("final")),
            StateValue::from("final")
        );
    }

    #[test]
    fn value_serializes_untagged() {
        let json = serde_json::to_string(&parallel()).unwrap();
        assert_eq!(json, r#"{"a":"x","b":"y"}"#);
        let back: StateValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, parallel());
    }
}
