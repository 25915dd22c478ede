//! Child interpreters started alongside their parent.
//!
//! A child's snapshots flow back into the parent context through the
//! binding's subscriptions. The merge is scheduled on the parent, so it runs
//! in order with the parent's own steps.

use crate::core::{deep_merge, merge_into};
use crate::effects::{ChildBinding, ChildMachine, ChildSubscription};
use crate::enforcement::Violation;
use crate::interpreter::cycle::{publish, schedule};
use crate::interpreter::status::Status;
use crate::interpreter::{Inner, Interpreter};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Create, bind and start every child of the machine. Must run without the
/// parent lock held.
pub(crate) fn start_children(inner: &Arc<Inner>) {
    let (bindings, machines, config) = {
        let core = inner.core.lock();
        (
            core.machine.children.clone(),
            core.machine.options.machines.clone(),
            core.config.clone(),
        )
    };

    for binding in bindings {
        let Some(child) = machines.get(&binding.id) else {
            debug!(child = %binding.id, "child machine missing, not started");
            continue;
        };
        let interpreter = spawn_child(child, config.clone());
        bind(inner, &interpreter, &binding);

        match interpreter.start() {
            Ok(()) => {
                debug!(child = %binding.id, "child started");
                inner.children.lock().insert(binding.id.clone(), interpreter);
            }
            Err(error) => {
                warn!(child = %binding.id, %error, "child failed to start");
                inner.core.lock().diagnostics.record(Violation::ChildStartup {
                    id: binding.id.clone(),
                    reason: error.to_string(),
                });
            }
        }
    }
}

fn spawn_child(child: &ChildMachine, config: crate::config::RuntimeConfig) -> Interpreter {
    let interpreter = Interpreter::with_config((*child.machine).clone(), config);
    interpreter
        .provide_context(child.context.clone())
        .provide_private_context(child.p_context.clone());
    interpreter
}

/// Subscribe the parent to `child` according to `binding`.
fn bind(inner: &Arc<Inner>, child: &Interpreter, binding: &ChildBinding) {
    if binding.subscriptions.is_empty() {
        return;
    }
    let parent = Arc::downgrade(inner);
    let subscriptions = binding.subscriptions.clone();
    let id = binding.id.clone();

    child.subscribe(move |_, snapshot| {
        let Some(parent) = parent.upgrade() else {
            return;
        };
        let parent_event = parent.core.lock().event.kind.clone();
        let delta = collect_delta(&subscriptions, &parent_event, &snapshot.event.kind, &snapshot.context);
        if delta.is_null() {
            return;
        }
        let id = id.clone();
        schedule(&parent, move |parent| merge_child(parent, &id, &delta));
    });
}

fn collect_delta(
    subscriptions: &[ChildSubscription],
    parent_event: &str,
    child_event: &str,
    child_context: &Value,
) -> Value {
    subscriptions
        .iter()
        .filter(|subscription| subscription.events.allows(parent_event, child_event))
        .fold(Value::Null, |acc, subscription| {
            deep_merge(&acc, &subscription.contexts.delta(child_context))
        })
}

fn merge_child(inner: &Arc<Inner>, id: &str, delta: &Value) {
    {
        let mut core = inner.core.lock();
        if core.status == Status::Stopped {
            return;
        }
        merge_into(&mut core.context, delta);
        debug!(child = %id, "child context merged");
    }
    publish(inner);
}
