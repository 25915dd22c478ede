//! Builders for transitions and promise branches.

use crate::core::{FinallyDef, GuardDef, PromiseDef, TransitionDef};

/// Builder for [`TransitionDef`] with a fluent API.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::builder::TransitionBuilder;
/// use mindset_statechart::core::GuardDef;
///
/// let transition = TransitionBuilder::to("/done")
///     .guard(GuardDef::And(vec!["ready".into(), "valid".into()]))
///     .action("save")
///     .build();
///
/// assert_eq!(transition.target.as_deref(), Some("/done"));
/// assert_eq!(transition.actions, vec!["save"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransitionBuilder {
    def: TransitionDef,
}

impl TransitionBuilder {
    /// Targetless transition: only runs its actions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transition to an absolute address.
    pub fn to(target: impl Into<String>) -> Self {
        Self::new().target(target)
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.def.target = Some(target.into());
        self
    }

    /// Guard over named predicates. A plain name converts with `.into()`.
    pub fn guard(mut self, guard: impl Into<GuardDef>) -> Self {
        self.def.guard = Some(guard.into());
        self
    }

    /// Add a named action (optional, repeatable).
    pub fn action(mut self, name: impl Into<String>) -> Self {
        self.def.actions.push(name.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.def.description = Some(description.into());
        self
    }

    pub fn build(self) -> TransitionDef {
        self.def
    }
}

impl From<TransitionBuilder> for TransitionDef {
    fn from(builder: TransitionBuilder) -> Self {
        builder.build()
    }
}

/// Builder for a `promises` entry.
///
/// ```rust
/// use mindset_statechart::builder::{PromiseBuilder, TransitionBuilder};
///
/// let promise = PromiseBuilder::new("fetchUser")
///     .max("fetchTimeout")
///     .then(TransitionBuilder::to("/ready").action("storeUser"))
///     .catch(TransitionBuilder::to("/failed"))
///     .finally("stopSpinner")
///     .build();
///
/// assert_eq!(promise.src, "fetchUser");
/// assert_eq!(promise.finally[0].actions, vec!["stopSpinner"]);
/// ```
#[derive(Debug, Clone)]
pub struct PromiseBuilder {
    def: PromiseDef,
}

impl PromiseBuilder {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            def: PromiseDef {
                src: src.into(),
                max: None,
                then: Vec::new(),
                catch: Vec::new(),
                finally: Vec::new(),
            },
        }
    }

    /// Delay name bounding the promise.
    pub fn max(mut self, delay: impl Into<String>) -> Self {
        self.def.max = Some(delay.into());
        self
    }

    pub fn then(mut self, transition: impl Into<TransitionDef>) -> Self {
        self.def.then.push(transition.into());
        self
    }

    pub fn catch(mut self, transition: impl Into<TransitionDef>) -> Self {
        self.def.catch.push(transition.into());
        self
    }

    /// Unconditional `finally` action.
    pub fn finally(mut self, action: impl Into<String>) -> Self {
        self.def.finally.push(FinallyDef {
            guard: None,
            actions: vec![action.into()],
        });
        self
    }

    /// `finally` actions run only when `guard` passes. The first passing
    /// entry wins.
    pub fn finally_when<I, S>(mut self, guard: impl Into<GuardDef>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.def.finally.push(FinallyDef {
            guard: Some(guard.into()),
            actions: actions.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn build(self) -> PromiseDef {
        self.def
    }
}

impl From<PromiseBuilder> for PromiseDef {
    fn from(builder: PromiseBuilder) -> Self {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targetless_transition_keeps_actions() {
        let transition = TransitionBuilder::new().action("a").action("b").build();

        assert_eq!(transition.target, None);
        assert_eq!(transition.actions, vec!["a", "b"]);
        assert_eq!(transition.guard, None);
    }

    #[test]
    fn guard_accepts_plain_names() {
        let transition = TransitionBuilder::to("/next").guard("ready").build();
        assert_eq!(transition.guard, Some(GuardDef::named("ready")));
    }

    #[test]
    fn finally_entries_keep_order() {
        let promise = PromiseBuilder::new("load")
            .finally_when("failed", ["logFailure"])
            .finally("cleanup")
            .build();

        assert_eq!(promise.finally.len(), 2);
        assert_eq!(promise.finally[0].guard, Some(GuardDef::named("failed")));
        assert_eq!(promise.finally[1].guard, None);
    }
}
