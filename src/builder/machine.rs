//! Builder for machines, with structural validation.

use crate::builder::error::BuildError;
use crate::config::DEFAULT_DELIMITER;
use crate::core::{flat_map, normalize, FlatIndex, Node, NodeType};
use crate::effects::{ChildBinding, Machine, Options};

/// Builder for constructing machines with a fluent API.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::builder::{BuildError, MachineBuilder, NodeBuilder, TransitionBuilder};
///
/// let machine = MachineBuilder::new()
///     .root(
///         NodeBuilder::compound("idle")
///             .state("idle", NodeBuilder::atomic().on("GO", TransitionBuilder::to("/done")))
///             .state("done", NodeBuilder::atomic()),
///     )
///     .build()
///     .unwrap();
/// assert_eq!(machine.root.states.len(), 2);
///
/// let broken = MachineBuilder::new()
///     .root(NodeBuilder::compound("idle").state(
///         "idle",
///         NodeBuilder::atomic().on("GO", TransitionBuilder::to("/nowhere")),
///     ))
///     .build();
/// assert!(matches!(broken, Err(BuildError::UnknownTarget { .. })));
/// ```
#[derive(Debug, Default)]
pub struct MachineBuilder {
    root: Option<Node>,
    options: Options,
    children: Vec<ChildBinding>,
}

impl MachineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root state (required).
    pub fn root(mut self, root: impl Into<Node>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Merge implementations into the machine options.
    pub fn options(mut self, options: Options) -> Self {
        self.options.merge(options);
        self
    }

    pub fn child(mut self, binding: ChildBinding) -> Self {
        self.children.push(binding);
        self
    }

    /// Build the machine.
    /// Returns the first structural error found, depth first.
    pub fn build(self) -> Result<Machine, BuildError> {
        let root = self.root.ok_or(BuildError::MissingRoot)?;
        validate(&root)?;

        let machine = self
            .children
            .into_iter()
            .fold(Machine::new(root).with_options(self.options), Machine::with_child);
        Ok(machine)
    }
}

/// Check the shape of a node tree and that every transition target exists.
pub fn validate(root: &Node) -> Result<(), BuildError> {
    let tree = flat_map(root, false, DEFAULT_DELIMITER, DEFAULT_DELIMITER);
    check_shape(root, DEFAULT_DELIMITER)?;
    for (path, node) in &tree {
        check_targets(&tree, path, node)?;
    }
    Ok(())
}

fn check_shape(node: &Node, path: &str) -> Result<(), BuildError> {
    match node.node_type {
        NodeType::Atomic if !node.states.is_empty() => {
            return Err(BuildError::AtomicWithChildren {
                path: path.to_string(),
            })
        }
        NodeType::Compound => {
            if node.states.is_empty() {
                return Err(BuildError::EmptyCompound {
                    path: path.to_string(),
                });
            }
            let initial = node
                .initial
                .as_ref()
                .ok_or_else(|| BuildError::MissingInitialState {
                    path: path.to_string(),
                })?;
            if !node.states.contains_key(initial) {
                return Err(BuildError::UnknownInitialState {
                    path: path.to_string(),
                    initial: initial.clone(),
                });
            }
        }
        NodeType::Parallel if node.states.is_empty() => {
            return Err(BuildError::EmptyParallel {
                path: path.to_string(),
            })
        }
        _ => {}
    }

    for (key, child) in &node.states {
        let child_path = if path == DEFAULT_DELIMITER {
            format!("{DEFAULT_DELIMITER}{key}")
        } else {
            format!("{path}{DEFAULT_DELIMITER}{key}")
        };
        check_shape(child, &child_path)?;
    }
    Ok(())
}

fn check_targets(tree: &FlatIndex, path: &str, node: &Node) -> Result<(), BuildError> {
    let transitions = node
        .on
        .values()
        .flatten()
        .chain(&node.always)
        .chain(node.after.iter().flat_map(|delayed| &delayed.transitions))
        .chain(
            node.promises
                .iter()
                .flat_map(|promise| promise.then.iter().chain(&promise.catch)),
        );

    for transition in transitions {
        let Some(target) = &transition.target else {
            continue;
        };
        if !tree.contains_key(&normalize(target)) {
            return Err(BuildError::UnknownTarget {
                path: path.to_string(),
                target: target.clone(),
            });
        }
    }
    Ok(())
}
