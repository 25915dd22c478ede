//! Builder API for ergonomic statechart construction.
//!
//! This module provides fluent builders for node trees, transitions, promise
//! branches and machines. [`MachineBuilder::build`] validates the structure
//! of the tree before handing out a [`Machine`](crate::effects::Machine).

pub mod error;
pub mod machine;
pub mod macros;
pub mod node;
pub mod transition;

pub use error::BuildError;
pub use machine::{validate, MachineBuilder};
pub use node::NodeBuilder;
pub use transition::{PromiseBuilder, TransitionBuilder};

use crate::core::TransitionDef;

/// Unconditional transition to `target`.
///
/// # Example
///
/// ```
/// use mindset_statechart::builder::simple_transition;
///
/// let transition = simple_transition("/done");
/// assert_eq!(transition.target.as_deref(), Some("/done"));
/// assert!(transition.guard.is_none());
/// ```
pub fn simple_transition(target: impl Into<String>) -> TransitionDef {
    TransitionBuilder::to(target).build()
}

/// Transition to `target` taken only when the named predicate passes.
///
/// # Example
///
/// ```
/// use mindset_statechart::builder::guarded_transition;
/// use mindset_statechart::core::GuardDef;
///
/// let transition = guarded_transition("/done", "isValid");
/// assert_eq!(transition.guard, Some(GuardDef::named("isValid")));
/// ```
pub fn guarded_transition(target: impl Into<String>, predicate: impl Into<String>) -> TransitionDef {
    TransitionBuilder::to(target)
        .guard(crate::core::GuardDef::named(predicate))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_build_expected_defs() {
        let simple = simple_transition("/b");
        let guarded = guarded_transition("/b", "ok");

        assert_eq!(simple.target, guarded.target);
        assert!(simple.actions.is_empty());
        assert!(guarded.guard.is_some());
    }
}
