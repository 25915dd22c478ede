//! Transition evaluation over working copies of the contexts.
//!
//! An [`Evaluator`] resolves guards, actions and delays by name against the
//! machine [`Options`]. Each action sees the contexts produced by the
//! previous ones; nothing touches the interpreter until [`Evaluator::finish`]
//! hands back the resulting [`Outcome`]. Missing references are recorded as
//! warnings: a missing predicate fails its guard, a missing action is a no-op.

use crate::core::{
    merge_into, DelayedTransition, Event, FlatIndex, GuardDef, StateValue, TransitionDef,
};
use crate::effects::machine::Options;
use crate::enforcement::{Reference, Violation};
use serde_json::Value;
use std::time::Duration;

/// A transition whose guard passed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chosen {
    pub target: Option<String>,
    pub actions: Vec<String>,
}

impl From<&TransitionDef> for Chosen {
    fn from(def: &TransitionDef) -> Self {
        Self {
            target: def.target.clone(),
            actions: def.actions.clone(),
        }
    }
}

/// Contexts and diagnostics produced by an evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    pub p_context: Value,
    pub context: Value,
    pub violations: Vec<Violation>,
}

/// Evaluates guards and runs actions for one step.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::core::{ActionResult, Event, TransitionDef};
/// use mindset_statechart::effects::{Evaluator, Options};
/// use serde_json::json;
///
/// let options = Options::new()
///     .predicate("positive", |_, context, _| context["n"].as_i64() > Some(0))
///     .action("double", |_, context, _| {
///         ActionResult::context(json!({ "n": context["n"].as_i64().unwrap_or(0) * 2 }))
///     });
///
/// let event = Event::new("GO");
/// let mut evaluator = Evaluator::new(&options, &event, &json!({}), &json!({ "n": 3 }));
///
/// let chosen = evaluator
///     .choose(&[TransitionDef {
///         target: Some("/done".to_string()),
///         guard: Some("positive".into()),
///         actions: vec!["double".to_string(), "double".to_string()],
///         description: None,
///     }])
///     .unwrap();
/// evaluator.run(&chosen.actions);
///
/// assert_eq!(evaluator.finish().context, json!({ "n": 12 }));
/// ```
pub struct Evaluator<'a> {
    options: &'a Options,
    event: &'a Event,
    p_context: Value,
    context: Value,
    violations: Vec<Violation>,
}

impl<'a> Evaluator<'a> {
    pub fn new(options: &'a Options, event: &'a Event, p_context: &Value, context: &Value) -> Self {
        Self {
            options,
            event,
            p_context: p_context.clone(),
            context: context.clone(),
            violations: Vec::new(),
        }
    }

    pub fn event(&self) -> &Event {
        self.event
    }

    pub fn context(&self) -> &Value {
        &self.context
    }

    pub fn p_context(&self) -> &Value {
        &self.p_context
    }

    /// Evaluate an optional guard. No guard passes.
    pub fn check(&mut self, guard: Option<&GuardDef>) -> bool {
        let Some(guard) = guard else {
            return true;
        };
        let predicates = &self.options.predicates;
        let (p_context, context, event) = (&self.p_context, &self.context, self.event);
        let mut missing = Vec::new();
        let passed = guard.evaluate(&mut |name: &str| match predicates.get(name) {
            Some(predicate) => predicate.check(p_context, context, event),
            None => {
                missing.push(Violation::not_defined(Reference::Predicate, name));
                false
            }
        });
        self.violations.extend(missing);
        passed
    }

    /// First candidate whose guard passes.
    pub fn choose(&mut self, candidates: &[TransitionDef]) -> Option<Chosen> {
        candidates
            .iter()
            .find(|def| self.check(def.guard.as_ref()))
            .map(Chosen::from)
    }

    /// Run actions in order, folding each delta into the working contexts.
    pub fn run(&mut self, actions: &[String]) {
        for name in actions {
            match self.options.actions.get(name) {
                Some(action) => {
                    let result = action.execute(&self.p_context, &self.context, self.event);
                    merge_into(&mut self.p_context, &result.p_context);
                    merge_into(&mut self.context, &result.context);
                }
                None => self
                    .violations
                    .push(Violation::not_defined(Reference::Action, name)),
            }
        }
    }

    /// Resolve and evaluate a named delay.
    pub fn delay(&mut self, name: &str) -> Option<Duration> {
        match self.options.delays.get(name) {
            Some(delay) => Some(delay.evaluate(&self.p_context, &self.context, self.event)),
            None => {
                self.violations
                    .push(Violation::not_defined(Reference::Delay, name));
                None
            }
        }
    }

    /// Record a violation found outside guard or action evaluation.
    pub fn report(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn finish(self) -> Outcome {
        Outcome {
            p_context: self.p_context,
            context: self.context,
            violations: self.violations,
        }
    }
}

/// Transitions selected for `event` from every active address, in path order.
pub fn select_on(evaluator: &mut Evaluator<'_>, active: &FlatIndex) -> Vec<Chosen> {
    let kind = evaluator.event().kind.clone();
    active
        .values()
        .filter_map(|node| node.on.get(&kind))
        .filter_map(|candidates| evaluator.choose(candidates))
        .collect()
}

/// The first `always` transition that passes, scanning active addresses in
/// path order.
pub fn select_always(evaluator: &mut Evaluator<'_>, active: &FlatIndex) -> Option<Chosen> {
    active
        .values()
        .filter(|node| !node.always.is_empty())
        .find_map(|node| evaluator.choose(&node.always))
}

/// First `after` transition that passes for the delayed group.
pub fn select_after(evaluator: &mut Evaluator<'_>, delayed: &DelayedTransition) -> Option<Chosen> {
    evaluator.choose(&delayed.transitions)
}

/// Apply every chosen target to `from`, in order.
pub fn propose(from: &StateValue, chosen: &[Chosen]) -> StateValue {
    chosen.iter().fold(from.clone(), |value, chosen| {
        crate::core::next_value(&value, chosen.target.as_deref())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ActionResult, Node};
    use serde_json::json;

    fn transition(target: &str, guard: Option<GuardDef>, actions: &[&str]) -> TransitionDef {
        TransitionDef {
            target: Some(target.to_string()),
            guard,
            actions: actions.iter().map(|a| a.to_string()).collect(),
            description: None,
        }
    }

    fn options() -> Options {
        Options::new()
            .predicate("never", |_, _, _| false)
            .predicate("always", |_, _, _| true)
            .action("inc", |_, context, _| {
                ActionResult::context(json!({ "n": context["n"].as_i64().unwrap_or(0) + 1 }))
            })
            .action("secret", |_, _, _| ActionResult::private(json!({ "token": "x" })))
    }

    #[test]
    fn first_passing_candidate_wins() {
        let options = options();
        let event = Event::new("GO");
        let mut evaluator = Evaluator::new(&options, &event, &json!({}), &json!({}));

        let chosen = evaluator.choose(&[
            transition("/a", Some("never".into()), &[]),
            transition("/b", Some("always".into()), &[]),
            transition("/c", None, &[]),
        ]);
        assert_eq!(chosen.unwrap().target.as_deref(), Some("/b"));
    }

    #[test]
    fn missing_predicate_fails_with_warning() {
        let options = options();
        let event = Event::new("GO");
        let mut evaluator = Evaluator::new(&options, &event, &json!({}), &json!({}));

        assert!(!evaluator.check(Some(&"ghost".into())));
        let outcome = evaluator.finish();
        assert_eq!(
            outcome.violations,
            vec![Violation::not_defined(Reference::Predicate, "ghost")]
        );
    }

    #[test]
    fn actions_see_previous_results() {
        let options = options();
        let event = Event::new("GO");
        let mut evaluator = Evaluator::new(&options, &event, &json!({}), &json!({ "n": 1 }));

        evaluator.run(&["inc".to_string(), "missing".to_string(), "inc".to_string(), "secret".to_string()]);
        let outcome = evaluator.finish();

        assert_eq!(outcome.context, json!({ "n": 3 }));
        assert_eq!(outcome.p_context, json!({ "token": "x" }));
        assert_eq!(
            outcome.violations,
            vec![Violation::not_defined(Reference::Action, "missing")]
        );
    }

    #[test]
    fn missing_delay_is_reported() {
        let options = options().fixed_delay("short", Duration::from_millis(5));
        let event = Event::new("GO");
        let mut evaluator = Evaluator::new(&options, &event, &json!({}), &json!({}));

        assert_eq!(evaluator.delay("short"), Some(Duration::from_millis(5)));
        assert_eq!(evaluator.delay("long"), None);
        assert_eq!(evaluator.finish().violations.len(), 1);
    }

    #[test]
    fn on_handlers_are_collected_in_path_order() {
        let mut left = Node::atomic();
        left.on.insert("GO".to_string(), vec![transition("/a/done", None, &[])]);
        let mut right = Node::atomic();
        right.on.insert("GO".to_string(), vec![transition("/b/done", None, &[])]);

        let active = FlatIndex::from([
            ("/".to_string(), Node::parallel()),
            ("/a".to_string(), left),
            ("/b".to_string(), right),
        ]);

        let options = options();
        let event = Event::new("GO");
        let mut evaluator = Evaluator::new(&options, &event, &json!({}), &json!({}));
        let targets: Vec<_> = select_on(&mut evaluator, &active)
            .into_iter()
            .filter_map(|c| c.target)
            .collect();
        assert_eq!(targets, vec!["/a/done", "/b/done"]);
    }

    #[test]
    fn propose_folds_targets() {
        let from = StateValue::from_paths(["/a/x", "/b/y"]);
        let chosen = vec![
            Chosen {
                target: Some("/a/z".to_string()),
                actions: vec![],
            },
            Chosen::default(),
            Chosen {
                target: Some("/b/w".to_string()),
                actions: vec![],
            },
        ];
        assert_eq!(propose(&from, &chosen), StateValue::from_paths(["/a/z", "/b/w"]));
    }
}
