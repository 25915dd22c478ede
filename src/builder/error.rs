//! Build errors for node trees and machines.

use thiserror::Error;

/// Structural problems found while building a machine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Root state not specified. Call .root(node) before .build()")]
    MissingRoot,

    #[error("Compound state {path} has no initial state. Call .initial(key)")]
    MissingInitialState { path: String },

    #[error("Initial state {initial} of {path} is not one of its children")]
    UnknownInitialState { path: String, initial: String },

    #[error("Compound state {path} has no children")]
    EmptyCompound { path: String },

    #[error("Parallel state {path} has no regions")]
    EmptyParallel { path: String },

    #[error("Atomic state {path} cannot have children")]
    AtomicWithChildren { path: String },

    #[error("Transition from {path} targets unknown state {target}")]
    UnknownTarget { path: String, target: String },
}
