//! Builder for state nodes.

use crate::core::{
    ActivityDef, DelayedTransition, GuardDef, Node, NodeType, PromiseDef, TransitionDef,
};

/// Builder for [`Node`] trees with a fluent API.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::builder::{NodeBuilder, TransitionBuilder};
/// use mindset_statechart::core::NodeType;
///
/// let root = NodeBuilder::compound("idle")
///     .state(
///         "idle",
///         NodeBuilder::atomic().on("FETCH", TransitionBuilder::to("/loading")),
///     )
///     .state("loading", NodeBuilder::atomic().tag("busy"))
///     .build();
///
/// assert_eq!(root.node_type, NodeType::Compound);
/// assert_eq!(root.states.len(), 2);
/// assert_eq!(root.states["idle"].on["FETCH"].len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct NodeBuilder {
    node: Node,
}

impl NodeBuilder {
    pub fn atomic() -> Self {
        Self {
            node: Node::atomic(),
        }
    }

    pub fn compound(initial: impl Into<String>) -> Self {
        Self {
            node: Node::compound(initial),
        }
    }

    pub fn parallel() -> Self {
        Self {
            node: Node::parallel(),
        }
    }

    pub fn node_type(mut self, node_type: NodeType) -> Self {
        self.node.node_type = node_type;
        self
    }

    pub fn initial(mut self, key: impl Into<String>) -> Self {
        self.node.initial = Some(key.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.node.description = Some(description.into());
        self
    }

    pub fn entry(mut self, action: impl Into<String>) -> Self {
        self.node.entry.push(action.into());
        self
    }

    pub fn exit(mut self, action: impl Into<String>) -> Self {
        self.node.exit.push(action.into());
        self
    }

    /// Add a candidate for `event`. Candidates are tried in insertion order.
    pub fn on(mut self, event: impl Into<String>, transition: impl Into<TransitionDef>) -> Self {
        self.node
            .on
            .entry(event.into())
            .or_default()
            .push(transition.into());
        self
    }

    /// Eventless transition evaluated after every step.
    pub fn always(mut self, transition: impl Into<TransitionDef>) -> Self {
        self.node.always.push(transition.into());
        self
    }

    /// Candidates fired once the named delay elapses.
    pub fn after<I, T>(mut self, delay: impl Into<String>, transitions: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TransitionDef>,
    {
        self.node.after.push(DelayedTransition {
            delay: delay.into(),
            transitions: transitions.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn promise(mut self, promise: impl Into<PromiseDef>) -> Self {
        self.node.promises.push(promise.into());
        self
    }

    /// Run `action` every period of the named delay while the state is active.
    pub fn activity(self, delay: impl Into<String>, action: impl Into<String>) -> Self {
        self.activity_def(
            delay,
            ActivityDef {
                guard: None,
                actions: vec![action.into()],
            },
        )
    }

    /// Guarded variant of [`activity`](Self::activity).
    pub fn activity_when(
        self,
        delay: impl Into<String>,
        guard: impl Into<GuardDef>,
        action: impl Into<String>,
    ) -> Self {
        self.activity_def(
            delay,
            ActivityDef {
                guard: Some(guard.into()),
                actions: vec![action.into()],
            },
        )
    }

    fn activity_def(mut self, delay: impl Into<String>, def: ActivityDef) -> Self {
        self.node
            .activities
            .entry(delay.into())
            .or_default()
            .push(def);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.node.tags.push(tag.into());
        self
    }

    /// Add a child state or region.
    pub fn state(mut self, key: impl Into<String>, child: impl Into<Node>) -> Self {
        self.node.states.insert(key.into(), child.into());
        self
    }

    pub fn build(self) -> Node {
        self.node
    }
}

impl From<NodeBuilder> for Node {
    fn from(builder: NodeBuilder) -> Self {
        builder.build()
    }
}
