//! Machine definitions: a resolved node tree plus the named implementations
//! it references.

use crate::core::{deep_merge, nest, select, Action, ActionResult, Delay, Event, Guard, Node};
use crate::effects::promise::PromiseSource;
use crate::enforcement::{Reference, Violation};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Implementations looked up by name while interpreting a tree.
///
/// Every map can be extended or overridden after construction with
/// [`Options::merge`]; later entries replace earlier ones.
#[derive(Clone, Debug, Default)]
pub struct Options {
    pub actions: HashMap<String, Action>,
    pub predicates: HashMap<String, Guard>,
    pub delays: HashMap<String, Delay>,
    pub promises: HashMap<String, PromiseSource>,
    pub machines: HashMap<String, ChildMachine>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action<F>(mut self, name: impl Into<String>, run: F) -> Self
    where
        F: Fn(&Value, &Value, &Event) -> ActionResult + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Action::new(run));
        self
    }

    /// Action that only writes the public context.
    pub fn assign<F>(mut self, name: impl Into<String>, assign: F) -> Self
    where
        F: Fn(&Value, &Event) -> Value + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Action::assign(assign));
        self
    }

    pub fn predicate<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value, &Value, &Event) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(name.into(), Guard::new(predicate));
        self
    }

    pub fn delay<F>(mut self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Value, &Value, &Event) -> Duration + Send + Sync + 'static,
    {
        self.delays.insert(name.into(), Delay::new(compute));
        self
    }

    pub fn fixed_delay(mut self, name: impl Into<String>, duration: Duration) -> Self {
        self.delays.insert(name.into(), Delay::fixed(duration));
        self
    }

    pub fn promise<F, Fut>(mut self, name: impl Into<String>, run: F) -> Self
    where
        F: Fn(Value, Value, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        self.promises.insert(name.into(), PromiseSource::new(run));
        self
    }

    pub fn machine(mut self, name: impl Into<String>, child: ChildMachine) -> Self {
        self.machines.insert(name.into(), child);
        self
    }

    /// Add or replace every entry of `other`.
    pub fn merge(&mut self, other: Options) {
        self.actions.extend(other.actions);
        self.predicates.extend(other.predicates);
        self.delays.extend(other.delays);
        self.promises.extend(other.promises);
        self.machines.extend(other.machines);
    }
}

/// A resolved node tree with its implementations and child bindings.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::core::Node;
/// use mindset_statechart::effects::{Machine, Options};
/// use serde_json::json;
///
/// let mut root = Node::compound("idle");
/// root.states.insert("idle".to_string(), Node::atomic());
///
/// let machine = Machine::new(root).with_options(
///     Options::new().assign("reset", |_, _| json!({ "count": 0 })),
/// );
/// assert!(machine.options.actions.contains_key("reset"));
/// ```
#[derive(Clone, Debug)]
pub struct Machine {
    pub root: Node,
    pub options: Options,
    pub children: Vec<ChildBinding>,
}

impl Machine {
    pub fn new(root: Node) -> Self {
        Self {
            root,
            options: Options::default(),
            children: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options.merge(options);
        self
    }

    /// Bind the child registered as `binding.id` in the machine options.
    pub fn with_child(mut self, binding: ChildBinding) -> Self {
        self.children.push(binding);
        self
    }

    /// Every name referenced by the tree or the child bindings that has no
    /// implementation in the options, in tree order.
    pub fn missing_references(&self) -> Vec<Violation> {
        let mut missing = Vec::new();
        collect_missing(&self.root, &self.options, &mut missing);
        for binding in &self.children {
            if !self.options.machines.contains_key(&binding.id) {
                missing.push(Violation::not_defined(Reference::Machine, &binding.id));
            }
        }
        let mut seen = HashSet::new();
        missing.retain(|violation| seen.insert(violation.clone()));
        missing
    }
}

fn collect_missing(node: &Node, options: &Options, out: &mut Vec<Violation>) {
    let mut action = |name: &String| {
        if !options.actions.contains_key(name) {
            out.push(Violation::not_defined(Reference::Action, name));
        }
    };
    node.entry.iter().for_each(&mut action);
    node.exit.iter().for_each(&mut action);

    let transitions = node
        .on
        .values()
        .flatten()
        .chain(&node.always)
        .chain(node.after.iter().flat_map(|after| &after.transitions))
        .chain(
            node.promises
                .iter()
                .flat_map(|promise| promise.then.iter().chain(&promise.catch)),
        );
    let mut guards = Vec::new();
    for transition in transitions {
        transition.actions.iter().for_each(&mut action);
        guards.extend(transition.guard.iter());
    }
    for def in node.promises.iter().flat_map(|promise| &promise.finally) {
        def.actions.iter().for_each(&mut action);
        guards.extend(def.guard.iter());
    }
    for def in node.activities.values().flatten() {
        def.actions.iter().for_each(&mut action);
        guards.extend(def.guard.iter());
    }

    for name in guards.iter().flat_map(|guard| guard.names()) {
        if !options.predicates.contains_key(name) {
            out.push(Violation::not_defined(Reference::Predicate, name));
        }
    }

    let delays = node
        .after
        .iter()
        .map(|after| &after.delay)
        .chain(node.activities.keys())
        .chain(node.promises.iter().filter_map(|promise| promise.max.as_ref()));
    for name in delays {
        if !options.delays.contains_key(name) {
            out.push(Violation::not_defined(Reference::Delay, name));
        }
    }
    for promise in &node.promises {
        if !options.promises.contains_key(&promise.src) {
            out.push(Violation::not_defined(Reference::Promise, &promise.src));
        }
    }

    for child in node.states.values() {
        collect_missing(child, options, out);
    }
}

/// A child machine with the contexts it starts with.
#[derive(Clone, Debug)]
pub struct ChildMachine {
    pub machine: Arc<Machine>,
    pub context: Value,
    pub p_context: Value,
}

impl ChildMachine {
    pub fn new(machine: Machine) -> Self {
        Self {
            machine: Arc::new(machine),
            context: Value::Object(Default::default()),
            p_context: Value::Object(Default::default()),
        }
    }

    pub fn context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn private_context(mut self, p_context: Value) -> Self {
        self.p_context = p_context;
        self
    }
}

/// Child started with the parent, and how its context flows back.
#[derive(Clone, Debug, PartialEq)]
pub struct ChildBinding {
    pub id: String,
    pub subscriptions: Vec<ChildSubscription>,
}

impl ChildBinding {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subscriptions: Vec::new(),
        }
    }

    pub fn subscribe(mut self, events: EventFilter, contexts: ContextMapping) -> Self {
        self.subscriptions.push(ChildSubscription { events, contexts });
        self
    }
}

/// One copy rule from a child context into its parent.
#[derive(Clone, Debug, PartialEq)]
pub struct ChildSubscription {
    pub events: EventFilter,
    pub contexts: ContextMapping,
}

/// Which child events trigger a copy.
#[derive(Clone, Debug, PartialEq)]
pub enum EventFilter {
    /// Every child event
    Full,
    /// Only these child event types
    Events(Vec<String>),
    /// Parent event type to the child event types allowed while the parent
    /// is handling it
    Paired(BTreeMap<String, Vec<String>>),
}

impl EventFilter {
    pub fn allows(&self, parent_event: &str, child_event: &str) -> bool {
        match self {
            Self::Full => true,
            Self::Events(events) => events.iter().any(|e| e == child_event),
            Self::Paired(pairs) => pairs
                .get(parent_event)
                .is_some_and(|events| events.iter().any(|e| e == child_event)),
        }
    }
}

/// Child context path(s) feeding one parent path.
#[derive(Clone, Debug, PartialEq)]
pub enum ChildPaths {
    One(String),
    /// Selected values are deep-merged in order
    Many(Vec<String>),
}

/// Where child context lands in the parent context. Paths use dots.
#[derive(Clone, Debug, PartialEq)]
pub enum ContextMapping {
    /// The whole child context at this parent path (`""` for the root)
    Whole(String),
    /// Parent path to child path(s)
    Fields(BTreeMap<String, ChildPaths>),
}

impl ContextMapping {
    /// Delta to merge into the parent context.
    ///
    /// ```rust
    /// use mindset_statechart::effects::{ChildPaths, ContextMapping};
    /// use serde_json::json;
    /// use std::collections::BTreeMap;
    ///
    /// let mapping = ContextMapping::Fields(BTreeMap::from([(
    ///     "progress.loaded".to_string(),
    ///     ChildPaths::One("bytes".to_string()),
    /// )]));
    /// assert_eq!(
    ///     mapping.delta(&json!({ "bytes": 512 })),
    ///     json!({ "progress": { "loaded": 512 } })
    /// );
    /// ```
    pub fn delta(&self, child_context: &Value) -> Value {
        match self {
            Self::Whole(path) => nest(path, child_context.clone()),
            Self::Fields(fields) => fields.iter().fold(Value::Null, |acc, (parent, paths)| {
                let selected = match paths {
                    ChildPaths::One(path) => select(child_context, path).cloned(),
                    ChildPaths::Many(paths) => paths
                        .iter()
                        .filter_map(|path| select(child_context, path))
                        .fold(None, |merged: Option<Value>, value| {
                            Some(match merged {
                                Some(merged) => deep_merge(&merged, value),
                                None => value.clone(),
                            })
                        }),
                };
                match selected {
                    Some(value) => deep_merge(&acc, &nest(parent, value)),
                    None => acc,
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_replaces_existing_entries() {
        let mut options = Options::new().assign("set", |_, _| json!({ "v": 1 }));
        options.merge(Options::new().assign("set", |_, _| json!({ "v": 2 })));

        let result = options.actions["set"].execute(&json!({}), &json!({}), &Event::new("X"));
        assert_eq!(result.context, json!({ "v": 2 }));
    }

    #[test]
    fn event_filters() {
        assert!(EventFilter::Full.allows("ANY", "child"));

        let list = EventFilter::Events(vec!["DONE".to_string()]);
        assert!(list.allows("ANY", "DONE"));
        assert!(!list.allows("ANY", "TICK"));

        let paired = EventFilter::Paired(BTreeMap::from([(
            "FETCH".to_string(),
            vec!["LOADED".to_string()],
        )]));
        assert!(paired.allows("FETCH", "LOADED"));
        assert!(!paired.allows("OTHER", "LOADED"));
    }

    #[test]
    fn whole_mapping_nests_child_context() {
        let mapping = ContextMapping::Whole("child".to_string());
        assert_eq!(
            mapping.delta(&json!({ "count": 2 })),
            json!({ "child": { "count": 2 } })
        );
        let root = ContextMapping::Whole(String::new());
        assert_eq!(root.delta(&json!({ "count": 2 })), json!({ "count": 2 }));
    }

    #[test]
    fn many_paths_merge_in_order() {
        let mapping = ContextMapping::Fields(BTreeMap::from([(
            "user".to_string(),
            ChildPaths::Many(vec!["profile".to_string(), "overrides".to_string()]),
        )]));
        let child = json!({
            "profile": { "name": "ada", "role": "dev" },
            "overrides": { "role": "lead" }
        });
        assert_eq!(
            mapping.delta(&child),
            json!({ "user": { "name": "ada", "role": "lead" } })
        );
    }

    #[test]
    fn missing_references_are_reported_once() {
        let mut idle = Node::atomic();
        idle.entry = vec!["log".to_string(), "log".to_string()];
        idle.activities.insert(
            "tick".to_string(),
            vec![crate::core::ActivityDef {
                guard: Some("ready".into()),
                actions: vec!["inc".to_string()],
            }],
        );
        let mut root = Node::compound("idle");
        root.states.insert("idle".to_string(), idle);

        let machine = Machine::new(root)
            .with_options(Options::new().assign("inc", |_, _| json!({})))
            .with_child(ChildBinding::new("worker"));

        let messages: Vec<String> = machine
            .missing_references()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            messages,
            vec![
                "Action (log) is not defined",
                "Predicate (ready) is not defined",
                "Delay (tick) is not defined",
                "Machine (worker) is not defined",
            ]
        );
    }

    #[test]
    fn missing_child_paths_produce_no_delta() {
        let mapping = ContextMapping::Fields(BTreeMap::from([(
            "x".to_string(),
            ChildPaths::One("absent".to_string()),
        )]));
        assert!(mapping.delta(&json!({})).is_null());
    }
}
