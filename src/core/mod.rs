//! Core statechart types and logic.
//!
//! This module contains the pure functional core of the runtime:
//! - State values and the algebra that moves them
//! - Resolved node trees and their flat, path-indexed views
//! - Guard, action and delay wrappers referenced by name
//! - Context merge and selection helpers
//! - Immutable history tracking
//!
//! Nothing in this module schedules work, owns timers or touches the async
//! runtime. The `effects` module is the imperative shell around it.

mod action;
mod context;
mod event;
mod flat;
mod guard;
mod history;
mod node;
mod value;

pub use action::{Action, ActionResult, Delay};
pub use context::{deep_merge, merge_into, nest, select};
pub use event::{Event, CATCH_EVENT, INIT_EVENT, THEN_EVENT};
pub use flat::{
    entered, exited, flat_map, index, node_to_value, path_to_node,
    retrieve_parent_from_initial, value_to_node, FlatIndex,
};
pub use guard::{Guard, GuardDef};
pub use history::{StateHistory, StateTransition};
pub use node::{ActivityDef, DelayedTransition, FinallyDef, Node, NodeType, PromiseDef, TransitionDef};
pub use value::{next_value, StateValue};

pub(crate) use value::normalize;
