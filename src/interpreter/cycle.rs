//! Steps run as scheduler tasks: start, event processing, the internal
//! cycle, activity ticks and publishing.
//!
//! The interpreter lock is taken and released inside each step. It is never
//! held while scheduling, so a task the scheduler runs immediately can take
//! it again.

use crate::core::Event;
use crate::effects::{select_always, select_on, Evaluator, PausableInterval};
use crate::enforcement::Violation;
use crate::interpreter::branch;
use crate::interpreter::core::Core;
use crate::interpreter::status::Status;
use crate::interpreter::Inner;
use std::sync::Arc;
use tracing::{debug, error};

/// Schedule `step` on the interpreter scheduler. The task holds only a weak
/// reference, so queued work never keeps a dropped interpreter alive.
pub(crate) fn schedule<F>(inner: &Arc<Inner>, step: F)
where
    F: FnOnce(&Arc<Inner>) + Send + 'static,
{
    let weak = Arc::downgrade(inner);
    inner.scheduler.schedule(Box::new(move || {
        if let Some(inner) = weak.upgrade() {
            step(&inner);
        }
    }));
}

/// Deliver the current snapshot to subscribers, after everything already
/// queued.
pub(crate) fn publish(inner: &Arc<Inner>) {
    schedule(inner, |inner| {
        let snapshot = inner.core.lock().snapshot();
        inner.subscribers.notify(&snapshot);
    });
}

/// First task of a started interpreter.
pub(crate) fn enter(inner: &Arc<Inner>) {
    {
        let mut core = inner.core.lock();
        if core.status != Status::Starting {
            return;
        }
        core.enter_initial();
        core.status = Status::Started;
        debug!(value = %core.value, "interpreter started");
    }
    next(inner);
    publish(inner);
}

/// Evaluate an external event.
pub(crate) fn process(inner: &Arc<Inner>, event: Event) {
    {
        let mut guard = inner.core.lock();
        let core = &mut *guard;
        if !core.status.is_running() {
            debug!(event = %event.kind, status = %core.status, "event dropped");
            return;
        }
        core.status = Status::Sending;
        core.pause_intervals();
        core.event = event.clone();
        core.loop_guard.reset();

        let mut evaluator =
            Evaluator::new(&core.machine.options, &event, &core.p_context, &core.context);
        let chosen = select_on(&mut evaluator, &core.flat);
        let violations = evaluator.finish().violations;
        core.diagnostics.extend(violations);

        if chosen.is_empty() {
            debug!(event = %event.kind, "no transition enabled");
        }
        core.commit(&chosen, &event);
        core.status = Status::Working;
    }
    next(inner);
    publish(inner);
}

/// Internal cycle: reconcile activities, replay remaining results and
/// follow `always` transitions until nothing changes, then start the
/// `after` and `promises` races of the resulting configuration.
pub(crate) fn next(inner: &Arc<Inner>) {
    loop {
        let mut guard = inner.core.lock();
        let core = &mut *guard;
        if !core.status.is_running() {
            return;
        }
        core.status = Status::Busy;
        reconcile_activities(inner, core);

        let replayed = core.replay_remaining();

        let event = core.event.clone();
        let mut evaluator =
            Evaluator::new(&core.machine.options, &event, &core.p_context, &core.context);
        let chosen = select_always(&mut evaluator, &core.flat);
        let violations = evaluator.finish().violations;
        core.diagnostics.extend(violations);
        let moved = match chosen {
            Some(chosen) => core.commit(&[chosen], &event),
            None => false,
        };

        let stepped = replayed || moved;
        if core.observe_step(stepped) {
            error!(value = %core.value, "self transition loop stopped");
            core.status = Status::Working;
            return;
        }
        if !stepped {
            break;
        }
    }

    branch::spawn_branches(inner);

    let mut core = inner.core.lock();
    if core.status == Status::Busy {
        core.status = Status::Working;
    }
}

/// Start or resume the interval of every activity on an active address.
///
/// A missing delay ends the pass for that address silently; startup
/// validation already reported it. Periods outside the configured bounds
/// are reported and skipped.
fn reconcile_activities(inner: &Arc<Inner>, core: &mut Core) {
    let Some(runtime) = core.runtime.clone() else {
        return;
    };
    if core.status == Status::Sending {
        return;
    }
    let event = core.event.clone();
    let mut created = Vec::new();

    for (path, node) in &core.flat {
        for delay_key in node.activities.keys() {
            let Some(delay) = core.machine.options.delays.get(delay_key) else {
                // Ends this address only. Other active addresses still run.
                break;
            };
            let period = delay.evaluate(&core.p_context, &core.context, &event);
            if period < core.config.min_activity_time {
                core.diagnostics.record(Violation::TooShort {
                    key: delay_key.clone(),
                });
                continue;
            }
            if period > core.config.max_time_promise {
                core.diagnostics.record(Violation::TooLong {
                    key: delay_key.clone(),
                });
                continue;
            }

            let key = format!("{path}::{delay_key}");
            match core.intervals.get(&key) {
                Some(interval) => interval.resume(),
                None => created.push((key, path.clone(), delay_key.clone(), period)),
            }
        }
    }

    for (key, path, delay_key, period) in created {
        let weak = Arc::downgrade(inner);
        let interval = PausableInterval::new(key.clone(), period, runtime.clone(), move || {
            if let Some(inner) = weak.upgrade() {
                let (path, delay_key) = (path.clone(), delay_key.clone());
                schedule(&inner, move |inner| tick(inner, &path, &delay_key));
            }
        });
        interval.start();
        debug!(interval = %key, ?period, "activity started");
        core.intervals.insert(key, interval);
    }
}

/// One activity tick: run every activity entry whose guard passes.
fn tick(inner: &Arc<Inner>, path: &str, delay_key: &str) {
    let changed = {
        let mut guard = inner.core.lock();
        let core = &mut *guard;
        if !core.status.is_running() {
            return;
        }
        let Some(defs) = core
            .flat
            .get(path)
            .and_then(|node| node.activities.get(delay_key))
        else {
            return;
        };
        let event = core.event.clone();
        let mut evaluator =
            Evaluator::new(&core.machine.options, &event, &core.p_context, &core.context);
        for def in defs {
            if evaluator.check(def.guard.as_ref()) {
                evaluator.run(&def.actions);
            }
        }
        let outcome = evaluator.finish();
        core.apply_outcome(outcome)
    };
    if changed {
        next(inner);
        publish(inner);
    }
}
