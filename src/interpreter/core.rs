//! Mutable runtime state of one interpreter.
//!
//! Everything here runs under the interpreter lock and never schedules work
//! or calls back into subscribers.

use crate::config::{RuntimeConfig, DEFAULT_DELIMITER};
use crate::core::{
    entered, exited, flat_map, index, node_to_value, path_to_node, retrieve_parent_from_initial,
    value_to_node, Event, FlatIndex, Node, StateHistory, StateTransition, StateValue, CATCH_EVENT,
    THEN_EVENT,
};
use crate::effects::{propose, select_after, Chosen, Evaluator, Machine, Outcome, PausableInterval};
use crate::enforcement::{Diagnostics, Violation};
use crate::interpreter::status::{StateSnapshot, Status};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Suffix of the branch key racing the `after` transitions of an address.
pub(crate) const AFTER: &str = "after";

/// Suffix of the branch key racing the `promises` of an address.
pub(crate) const PROMISE: &str = "promise";

pub(crate) fn branch_key(path: &str, kind: &str) -> String {
    format!("{path}::{kind}")
}

/// How a promise race settled.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PromiseOutcome {
    Then(Value),
    Catch(Value),
}

/// Result of an `after` or `promises` race, applied later through the
/// scheduler or replayed once its address is active again.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Settlement {
    After {
        path: String,
        chosen: Chosen,
    },
    Promise {
        path: String,
        index: usize,
        outcome: PromiseOutcome,
    },
}

impl Settlement {
    pub(crate) fn path(&self) -> &str {
        match self {
            Self::After { path, .. } | Self::Promise { path, .. } => path,
        }
    }
}

/// A spawned race. Dropping the handle detaches the task.
pub(crate) struct Branch {
    pub(crate) generation: u64,
    pub(crate) task: JoinHandle<()>,
}

/// Counts consecutive fast internal value changes.
#[derive(Debug, Default)]
pub(crate) struct LoopGuard {
    count: usize,
    last: Option<Instant>,
}

impl LoopGuard {
    pub(crate) fn reset(&mut self) {
        self.count = 0;
        self.last = None;
    }

    /// Record one internal step. True when the threshold is reached.
    pub(crate) fn observe(&mut self, changed: bool, window: Duration, max: usize) -> bool {
        if !changed {
            self.count = 0;
            return false;
        }
        let now = Instant::now();
        if self
            .last
            .is_some_and(|last| now.duration_since(last) > window)
        {
            self.count = 0;
        }
        self.last = Some(now);
        self.count += 1;
        if self.count >= max {
            self.count = 0;
            return true;
        }
        false
    }
}

pub(crate) struct Core {
    pub(crate) machine: Machine,
    pub(crate) config: RuntimeConfig,
    pub(crate) status: Status,
    /// Every address of the machine, without children
    pub(crate) tree: FlatIndex,
    pub(crate) value: StateValue,
    pub(crate) configuration: Node,
    /// Active addresses
    pub(crate) flat: FlatIndex,
    pub(crate) context: Value,
    pub(crate) p_context: Value,
    pub(crate) context_provided: bool,
    pub(crate) p_context_provided: bool,
    pub(crate) event: Event,
    pub(crate) history: StateHistory,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) intervals: BTreeMap<String, PausableInterval>,
    pub(crate) branches: HashMap<String, Branch>,
    pub(crate) remaining: BTreeMap<String, Settlement>,
    pub(crate) loop_guard: LoopGuard,
    pub(crate) generation: u64,
    pub(crate) runtime: Option<Handle>,
    pub(crate) restored: bool,
}

impl Core {
    pub(crate) fn new(machine: Machine, config: RuntimeConfig) -> Self {
        let tree = flat_map(&machine.root, false, DEFAULT_DELIMITER, DEFAULT_DELIMITER);
        let configuration = machine.root.without_children();
        Self {
            machine,
            config,
            status: Status::Idle,
            tree,
            value: StateValue::empty(),
            configuration,
            flat: FlatIndex::new(),
            context: Value::Object(Map::new()),
            p_context: Value::Object(Map::new()),
            context_provided: false,
            p_context_provided: false,
            event: Event::init(),
            history: StateHistory::new(),
            diagnostics: Diagnostics::default(),
            intervals: BTreeMap::new(),
            branches: HashMap::new(),
            remaining: BTreeMap::new(),
            loop_guard: LoopGuard::default(),
            generation: 0,
            runtime: None,
            restored: false,
        }
    }

    /// Resolve the starting configuration: the restored value if any,
    /// otherwise the initial descendants of the root.
    pub(crate) fn initialize(&mut self) {
        self.configuration = if self.restored && !self.value.is_empty() {
            value_to_node(&self.machine.root, &self.value)
        } else {
            path_to_node(&self.machine.root, DEFAULT_DELIMITER)
        };
        self.value = node_to_value(&self.configuration);
        self.flat = index(&self.configuration);
        if !self.restored {
            self.event = Event::init();
        }
    }

    /// Run the entry actions of the starting configuration, shallowest first.
    pub(crate) fn enter_initial(&mut self) {
        if self.restored {
            return;
        }
        let event = self.event.clone();
        let mut evaluator =
            Evaluator::new(&self.machine.options, &event, &self.p_context, &self.context);
        for node in self.flat.values() {
            evaluator.run(&node.entry);
        }
        let outcome = evaluator.finish();
        self.apply_outcome(outcome);
    }

    /// Record violations and adopt the evaluated contexts. True when either
    /// context changed.
    pub(crate) fn apply_outcome(&mut self, outcome: Outcome) -> bool {
        self.diagnostics.extend(outcome.violations);
        let changed = outcome.context != self.context || outcome.p_context != self.p_context;
        self.p_context = outcome.p_context;
        self.context = outcome.context;
        changed
    }

    /// Apply chosen transitions for `event`. Returns true when the state
    /// value changed.
    ///
    /// An unchanged value runs only the transition actions and keeps the
    /// current configuration. Otherwise exits run deepest first, then the
    /// transition actions, then entries shallowest first.
    pub(crate) fn commit(&mut self, chosen: &[Chosen], event: &Event) -> bool {
        let proposal = propose(&self.value, chosen);
        let next = if proposal == self.value {
            None
        } else {
            let configuration = value_to_node(&self.machine.root, &proposal);
            let value = node_to_value(&configuration);
            (value != self.value).then(|| {
                let flat = index(&configuration);
                (configuration, value, flat)
            })
        };

        let mut evaluator =
            Evaluator::new(&self.machine.options, event, &self.p_context, &self.context);
        let mut left = Vec::new();
        match &next {
            Some((_, _, flat)) => {
                left = exited(&self.flat, flat);
                let arrived = entered(&self.flat, flat);
                for path in &left {
                    if let Some(node) = self.flat.get(path) {
                        evaluator.run(&node.exit);
                    }
                }
                for transition in chosen {
                    evaluator.run(&transition.actions);
                }
                for path in &arrived {
                    if let Some(node) = flat.get(path) {
                        evaluator.run(&node.entry);
                    }
                }
                // Entry actions above already ran for every entered address.
                // The targets collapse implicit initial children for the log only.
                let mut targets: Vec<String> = arrived
                    .iter()
                    .map(|path| retrieve_parent_from_initial(&self.tree, path))
                    .collect();
                targets.dedup();
                debug!(
                    event = %event.kind,
                    internal = event.is_internal(),
                    exited = ?left,
                    entered = ?targets,
                    "transition"
                );
            }
            None => {
                for transition in chosen {
                    evaluator.run(&transition.actions);
                }
            }
        }
        let outcome = evaluator.finish();
        self.apply_outcome(outcome);

        let Some((configuration, value, flat)) = next else {
            return false;
        };
        self.history.push_bounded(
            StateTransition {
                from: self.value.clone(),
                to: value.clone(),
                event: event.kind.clone(),
                timestamp: Utc::now(),
            },
            self.config.history_limit,
        );
        for path in &left {
            self.deactivate(path);
        }
        self.value = value;
        self.configuration = configuration;
        self.flat = flat;
        true
    }

    /// Pause the intervals of an exited address and detach its branches.
    fn deactivate(&mut self, path: &str) {
        let prefix = format!("{path}::");
        for (key, interval) in self.intervals.range(prefix.clone()..) {
            if !key.starts_with(&prefix) {
                break;
            }
            interval.pause();
        }
        for kind in [AFTER, PROMISE] {
            if self.branches.remove(&branch_key(path, kind)).is_some() {
                debug!(branch = %branch_key(path, kind), "branch detached");
            }
        }
    }

    /// Guards of the `after` group at `index`, evaluated now. Uses the full
    /// tree so an exited address can still settle into a remaining result.
    pub(crate) fn choose_after(&mut self, path: &str, index: usize) -> Option<Chosen> {
        let delayed = self.tree.get(path)?.after.get(index)?;
        let event = self.event.clone();
        let mut evaluator =
            Evaluator::new(&self.machine.options, &event, &self.p_context, &self.context);
        let chosen = select_after(&mut evaluator, delayed);
        let violations = evaluator.finish().violations;
        self.diagnostics.extend(violations);
        chosen
    }

    /// Apply a settled race. Returns true when the state value changed.
    pub(crate) fn apply_settlement(&mut self, settlement: Settlement) -> bool {
        match settlement {
            Settlement::After { chosen, .. } => {
                let event = self.event.clone();
                self.commit(&[chosen], &event)
            }
            Settlement::Promise {
                path,
                index,
                outcome,
            } => {
                let Some(def) = self
                    .tree
                    .get(&path)
                    .and_then(|node| node.promises.get(index))
                    .cloned()
                else {
                    return false;
                };
                let (event, candidates) = match outcome {
                    PromiseOutcome::Then(value) => {
                        (Event::with_payload(THEN_EVENT, value), def.then)
                    }
                    PromiseOutcome::Catch(reason) => {
                        (Event::with_payload(CATCH_EVENT, reason), def.catch)
                    }
                };
                self.event = event.clone();

                let mut evaluator =
                    Evaluator::new(&self.machine.options, &event, &self.p_context, &self.context);
                let mut chosen = evaluator.choose(&candidates).unwrap_or_default();
                if let Some(matched) = def
                    .finally
                    .iter()
                    .find(|finally| evaluator.check(finally.guard.as_ref()))
                {
                    chosen.actions.extend(matched.actions.iter().cloned());
                }
                let violations = evaluator.finish().violations;
                self.diagnostics.extend(violations);
                self.commit(&[chosen], &event)
            }
        }
    }

    /// Apply stored results whose address is active again. True when the
    /// state value changed.
    pub(crate) fn replay_remaining(&mut self) -> bool {
        let ready: Vec<String> = self
            .remaining
            .iter()
            .filter(|(_, settlement)| self.flat.contains_key(settlement.path()))
            .map(|(key, _)| key.clone())
            .collect();
        let mut changed = false;
        for key in ready {
            if let Some(settlement) = self.remaining.remove(&key) {
                debug!(branch = %key, "replaying remaining result");
                changed |= self.apply_settlement(settlement);
            }
        }
        changed
    }

    /// Feed the loop guard. Records the error when it trips.
    pub(crate) fn observe_step(&mut self, changed: bool) -> bool {
        let tripped = self.loop_guard.observe(
            changed,
            self.config.min_activity_time,
            self.config.max_self_transitions,
        );
        if tripped {
            self.diagnostics
                .record(Violation::TooManySelfTransitions {
                    max: self.config.max_self_transitions,
                });
        }
        tripped
    }

    pub(crate) fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub(crate) fn pause_intervals(&self) {
        for interval in self.intervals.values() {
            interval.pause();
        }
    }

    /// Release every timer and task. Remaining results are discarded.
    pub(crate) fn teardown(&mut self) {
        for interval in self.intervals.values() {
            interval.stop();
        }
        self.intervals.clear();
        for (_, branch) in self.branches.drain() {
            branch.task.abort();
        }
        self.remaining.clear();
    }

    pub(crate) fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for tag in self.flat.values().flat_map(|node| &node.tags) {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }

    pub(crate) fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            value: self.value.clone(),
            context: self.context.clone(),
            event: self.event.clone(),
            status: self.status,
            tags: self.tags(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ActionResult, TransitionDef};
    use crate::effects::Options;
    use serde_json::json;

    fn machine() -> Machine {
        let mut idle = Node::atomic();
        idle.exit = vec!["log_exit".to_string()];
        let mut busy = Node::atomic();
        busy.entry = vec!["log_entry".to_string()];
        busy.tags = vec!["loading".to_string()];

        let mut root = Node::compound("idle");
        root.states.insert("idle".to_string(), idle);
        root.states.insert("busy".to_string(), busy);

        let log = |label: &'static str| {
            move |_: &Value, context: &Value, _: &Event| {
                let mut trail = context["trail"].as_array().cloned().unwrap_or_default();
                trail.push(json!(label));
                ActionResult::context(json!({ "trail": trail }))
            }
        };
        Machine::new(root).with_options(
            Options::new()
                .action("log_exit", log("exit"))
                .action("log_entry", log("entry"))
                .action("log_transition", log("transition")),
        )
    }

    fn started() -> Core {
        let mut core = Core::new(machine(), RuntimeConfig::default());
        core.initialize();
        core
    }

    fn to(target: &str) -> Chosen {
        Chosen::from(&TransitionDef {
            target: Some(target.to_string()),
            guard: None,
            actions: vec!["log_transition".to_string()],
            description: None,
        })
    }

    #[test]
    fn exits_run_before_transition_actions_and_entries() {
        let mut core = started();
        assert!(core.commit(&[to("/busy")], &Event::new("GO")));

        assert_eq!(core.value, StateValue::from("busy"));
        assert_eq!(core.context["trail"], json!(["exit", "transition", "entry"]));
        assert_eq!(core.tags(), vec!["loading"]);
        assert_eq!(core.history.len(), 1);
    }

    #[test]
    fn unchanged_value_skips_entry_and_exit() {
        let mut core = started();
        assert!(!core.commit(&[to("/idle")], &Event::new("STAY")));

        assert_eq!(core.context["trail"], json!(["transition"]));
        assert!(core.history.is_empty());
    }

    #[test]
    fn settlements_for_inactive_addresses_wait_for_replay() {
        let mut core = started();
        core.remaining.insert(
            branch_key("/busy", AFTER),
            Settlement::After {
                path: "/busy".to_string(),
                chosen: to("/idle"),
            },
        );

        assert!(!core.replay_remaining());
        assert_eq!(core.remaining.len(), 1);

        core.commit(&[to("/busy")], &Event::new("GO"));
        assert!(core.replay_remaining());
        assert_eq!(core.value, StateValue::from("idle"));
        assert!(core.remaining.is_empty());
    }

    #[test]
    fn loop_guard_trips_at_threshold_and_resets_without_change() {
        let mut guard = LoopGuard::default();
        let window = Duration::from_secs(60);
        for _ in 0..4 {
            assert!(!guard.observe(true, window, 5));
        }
        assert!(!guard.observe(false, window, 5));
        for _ in 0..4 {
            assert!(!guard.observe(true, window, 5));
        }
        assert!(guard.observe(true, window, 5));
    }
}
