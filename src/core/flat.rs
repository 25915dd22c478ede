//! Path-indexed views of a node tree and resolution between nodes and values.

use crate::config::DEFAULT_DELIMITER;
use crate::core::node::{Node, NodeType};
use crate::core::value::{normalize, parent_path, StateValue};
use std::collections::BTreeMap;

/// Absolute address to node. The root is always `/`.
pub type FlatIndex = BTreeMap<String, Node>;

/// Flatten a node tree depth first into absolute addresses.
///
/// With `with_children` set to false every entry is stored without its
/// `states`, so subtrees are not duplicated across entries.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::core::{flat_map, Node};
///
/// let mut root = Node::compound("idle");
/// root.states.insert("idle".to_string(), Node::atomic());
/// root.states.insert("busy".to_string(), Node::atomic());
///
/// let index = flat_map(&root, false, "/", "/");
/// let keys: Vec<_> = index.keys().cloned().collect();
/// assert_eq!(keys, vec!["/", "/busy", "/idle"]);
/// assert!(index["/"].states.is_empty());
/// ```
pub fn flat_map(node: &Node, with_children: bool, delimiter: &str, path: &str) -> FlatIndex {
    let mut out = FlatIndex::new();
    collect(node, with_children, delimiter, path, &mut out);
    out
}

fn collect(node: &Node, with_children: bool, delimiter: &str, path: &str, out: &mut FlatIndex) {
    let entry = if with_children {
        node.clone()
    } else {
        node.without_children()
    };
    out.insert(path.to_string(), entry);

    for (key, child) in &node.states {
        let child_path = if path == delimiter {
            format!("{delimiter}{key}")
        } else {
            format!("{path}{delimiter}{key}")
        };
        collect(child, with_children, delimiter, &child_path, out);
    }
}

/// Index of the active configuration with the default delimiter.
pub fn index(config: &Node) -> FlatIndex {
    flat_map(config, false, DEFAULT_DELIMITER, DEFAULT_DELIMITER)
}

/// Resolve a state value to the minimal subtree of `root` that contains it.
///
/// Compound nodes keep only the child named by the value, falling back to
/// their initial child. Parallel nodes keep every region; regions missing
/// from the value enter their initial configuration.
pub fn value_to_node(root: &Node, value: &StateValue) -> Node {
    resolve(root, Some(value))
}

/// Resolve a single absolute path, entering initial descendants below it.
pub fn path_to_node(root: &Node, path: &str) -> Node {
    let path = normalize(path);
    if path == DEFAULT_DELIMITER {
        return resolve(root, None);
    }
    resolve(root, Some(&StateValue::from_paths([path])))
}

fn resolve(node: &Node, value: Option<&StateValue>) -> Node {
    let mut out = node.without_children();
    match node.node_type {
        NodeType::Atomic => {}
        NodeType::Compound => {
            let chosen = value
                .and_then(|value| pick_child(node, value))
                .or_else(|| {
                    node.initial_child()
                        .and_then(|key| node.states.get_key_value(key))
                        .map(|(key, child)| (key, child, None))
                });
            if let Some((key, child, sub)) = chosen {
                out.states.insert(key.clone(), resolve(child, sub));
            }
        }
        NodeType::Parallel => {
            for (key, child) in &node.states {
                let sub = match value {
                    Some(StateValue::Branch(map)) => map.get(key),
                    _ => None,
                };
                out.states.insert(key.clone(), resolve(child, sub));
            }
        }
    }
    out
}

fn pick_child<'a>(
    node: &'a Node,
    value: &'a StateValue,
) -> Option<(&'a String, &'a Node, Option<&'a StateValue>)> {
    match value {
        StateValue::Leaf(key) => node
            .states
            .get_key_value(key)
            .map(|(key, child)| (key, child, None)),
        StateValue::Branch(map) => map.iter().find_map(|(key, sub)| {
            node.states
                .get_key_value(key)
                .map(|(key, child)| (key, child, Some(sub)))
        }),
    }
}

/// Inverse of [`value_to_node`]: the value described by a (sub)tree.
///
/// A compound whose active child is atomic collapses to that child's key.
///
/// ```rust
/// use mindset_statechart::core::{node_to_value, Node, StateValue};
///
/// let mut root = Node::compound("idle");
/// root.states.insert("idle".to_string(), Node::atomic());
/// root.states.insert("busy".to_string(), Node::atomic());
///
/// assert_eq!(node_to_value(&root), StateValue::from("idle"));
/// ```
pub fn node_to_value(node: &Node) -> StateValue {
    match node.node_type {
        NodeType::Atomic => StateValue::empty(),
        NodeType::Compound => {
            let active = if node.states.len() == 1 {
                node.states.iter().next()
            } else {
                node.initial_child()
                    .and_then(|key| node.states.get_key_value(key))
            };
            match active {
                Some((key, child)) if child.is_atomic() => StateValue::Leaf(key.clone()),
                Some((key, child)) => {
                    let mut map = BTreeMap::new();
                    map.insert(key.clone(), node_to_value(child));
                    StateValue::Branch(map)
                }
                None => StateValue::empty(),
            }
        }
        NodeType::Parallel => StateValue::Branch(
            node.states
                .iter()
                .map(|(key, child)| (key.clone(), node_to_value(child)))
                .collect(),
        ),
    }
}

/// Nearest ancestor of `path` that is not entered implicitly as an initial
/// child. Returns `path` itself when it is not an initial child.
///
/// ```rust
/// use mindset_statechart::core::{flat_map, retrieve_parent_from_initial, Node};
///
/// let mut working = Node::compound("fetch");
/// working.states.insert("fetch".to_string(), Node::atomic());
/// working.states.insert("done".to_string(), Node::atomic());
/// let mut root = Node::compound("idle");
/// root.states.insert("idle".to_string(), Node::atomic());
/// root.states.insert("working".to_string(), working);
///
/// let all = flat_map(&root, false, "/", "/");
/// assert_eq!(retrieve_parent_from_initial(&all, "/working/fetch"), "/working");
/// assert_eq!(retrieve_parent_from_initial(&all, "/working/done"), "/working/done");
/// ```
pub fn retrieve_parent_from_initial(index: &FlatIndex, path: &str) -> String {
    let mut current = normalize(path);
    loop {
        let parent = parent_path(&current);
        let parent_key = if parent.is_empty() {
            DEFAULT_DELIMITER.to_string()
        } else {
            parent.clone()
        };
        let Some(parent_node) = index.get(&parent_key) else {
            return current;
        };
        let key = &current[parent.len() + DEFAULT_DELIMITER.len()..];
        let implicit = parent_node.node_type == NodeType::Compound
            && parent_node.initial.as_deref() == Some(key)
            && parent_key != DEFAULT_DELIMITER;
        if !implicit {
            return current;
        }
        current = parent_key;
    }
}

/// Addresses present in `from` and missing from `to`, deepest first.
pub fn exited(from: &FlatIndex, to: &FlatIndex) -> Vec<String> {
    from.keys()
        .rev()
        .filter(|path| !to.contains_key(*path))
        .cloned()
        .collect()
}

/// Addresses present in `to` and missing from `from`, shallowest first.
pub fn entered(from: &FlatIndex, to: &FlatIndex) -> Vec<String> {
    to.keys()
        .filter(|path| !from.contains_key(*path))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `/` compound(idle) with `idle`, and `working` parallel with regions
    /// `fetch` (compound: `waiting`, `done`) and `ui` (atomic).
    fn tree() -> Node {
        let mut fetch = Node::compound("waiting");
        fetch.states.insert("waiting".to_string(), Node::atomic());
        fetch.states.insert("done".to_string(), Node::atomic());

        let mut working = Node::parallel();
        working.states.insert("fetch".to_string(), fetch);
        working.states.insert("ui".to_string(), Node::atomic());

        let mut root = Node::compound("idle");
        root.states.insert("idle".to_string(), Node::atomic());
        root.states.insert("working".to_string(), working);
        root
    }

    #[test]
    fn every_path_appears_once() {
        let all = flat_map(&tree(), true, "/", "/");
        let keys: Vec<_> = all.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                "/",
                "/idle",
                "/working",
                "/working/fetch",
                "/working/fetch/done",
                "/working/fetch/waiting",
                "/working/ui",
            ]
        );
        assert_eq!(all["/working"].states.len(), 2);
    }

    #[test]
    fn custom_delimiter_is_used() {
        let all = flat_map(&tree(), false, ".", ".");
        assert!(all.contains_key(".working.fetch.done"));
    }

    #[test]
    fn initial_resolution_enters_initial_child() {
        let config = value_to_node(&tree(), &StateValue::empty());
        let active = index(&config);
        assert_eq!(active.keys().cloned().collect::<Vec<_>>(), vec!["/", "/idle"]);
        assert_eq!(node_to_value(&config), StateValue::from("idle"));
    }

    #[test]
    fn parallel_target_fills_missing_regions() {
        let config = path_to_node(&tree(), "/working/fetch/done");
        let value = node_to_value(&config);
        assert_eq!(
            value,
            StateValue::from_paths(["/working/fetch/done", "/working/ui"])
        );
    }

    #[test]
    fn compound_target_enters_initial_descendants() {
        let config = path_to_node(&tree(), "/working");
        assert_eq!(
            node_to_value(&config),
            StateValue::from_paths(["/working/fetch/waiting", "/working/ui"])
        );
    }

    #[test]
    fn value_round_trips_through_nodes() {
        let value = StateValue::from_paths(["/working/fetch/done", "/working/ui"]);
        let config = value_to_node(&tree(), &value);
        assert_eq!(node_to_value(&config), value);
    }

    #[test]
    fn diff_orders_exits_and_entries() {
        let before = index(&path_to_node(&tree(), "/idle"));
        let after = index(&path_to_node(&tree(), "/working/fetch/done"));

        assert_eq!(exited(&before, &after), vec!["/idle"]);
        assert_eq!(
            entered(&before, &after),
            vec![
                "/working",
                "/working/fetch",
                "/working/fetch/done",
                "/working/ui",
            ]
        );
        assert_eq!(
            exited(&after, &before),
            vec![
                "/working/ui",
                "/working/fetch/done",
                "/working/fetch",
                "/working",
            ]
        );
    }

    #[test]
    fn initial_children_resolve_to_their_parent() {
        let all = flat_map(&tree(), false, "/", "/");
        assert_eq!(
            retrieve_parent_from_initial(&all, "/working/fetch/waiting"),
            "/working/fetch"
        );
        assert_eq!(
            retrieve_parent_from_initial(&all, "/working/fetch/done"),
            "/working/fetch/done"
        );
        assert_eq!(retrieve_parent_from_initial(&all, "/idle"), "/idle");
    }
}
