//! `after` and `promises` races of active addresses.
//!
//! Each address with delayed transitions or promises gets one race per kind,
//! keyed `${path}::after` or `${path}::promise`. A race runs on the tokio
//! runtime and settles back through the scheduler. A result for an address
//! that is no longer active is kept and replayed when the address is entered
//! again.

use crate::core::Event;
use crate::effects::{
    race_promises, with_timeout, Chosen, Evaluator, Options, TimeoutError, TimeoutPromise,
};
use crate::enforcement::{Reference, Violation};
use crate::interpreter::core::{branch_key, Branch, Core, PromiseOutcome, Settlement, AFTER, PROMISE};
use crate::interpreter::cycle::{next, publish, schedule};
use crate::interpreter::status::Status;
use crate::interpreter::Inner;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, warn};

/// Start the missing races of the current configuration.
pub(crate) fn spawn_branches(inner: &Arc<Inner>) {
    let mut guard = inner.core.lock();
    let core = &mut *guard;
    if !core.status.is_running() {
        return;
    }
    let Some(runtime) = core.runtime.clone() else {
        return;
    };

    let weak = Arc::downgrade(inner);
    let mut races: Vec<(String, BoxFuture<'static, Option<Settlement>>)> = Vec::new();
    let event = core.event.clone();

    let addresses: Vec<(String, bool, bool)> = core
        .flat
        .iter()
        .map(|(path, node)| (path.clone(), !node.after.is_empty(), !node.promises.is_empty()))
        .collect();
    for (path, has_after, has_promises) in addresses {
        let idle = |core: &Core, key: &str| {
            !core.branches.contains_key(key) && !core.remaining.contains_key(key)
        };
        let key = branch_key(&path, AFTER);
        if has_after && idle(core, &key) {
            let race = after_race(&weak, core, &path, &key, &event);
            races.push((key, race));
        }
        let key = branch_key(&path, PROMISE);
        if has_promises && idle(core, &key) {
            let race = promise_race(core, &path, &key, &event);
            races.push((key, race));
        }
    }

    for (key, race) in races {
        let generation = core.next_generation();
        let weak = weak.clone();
        let settle_key = key.clone();
        let task = runtime.spawn(async move {
            if let Some(settlement) = race.await {
                settle(&weak, &settle_key, generation, settlement);
            }
        });
        debug!(branch = %key, generation, "branch spawned");
        core.branches.insert(key, Branch { generation, task });
    }
}

/// Race every delayed group of `path`. A group fires after its delay if one
/// of its guards passes at that moment, otherwise it never settles.
fn after_race(
    weak: &Weak<Inner>,
    core: &mut Core,
    path: &str,
    key: &str,
    event: &Event,
) -> BoxFuture<'static, Option<Settlement>> {
    let Some(node) = core.flat.get(path) else {
        return future::ready(None).boxed();
    };
    let mut evaluator =
        Evaluator::new(&core.machine.options, event, &core.p_context, &core.context);
    let mut operands: Vec<TimeoutPromise<Chosen>> = Vec::new();

    for (index, delayed) in node.after.iter().enumerate() {
        let Some(delay) = evaluator.delay(&delayed.delay) else {
            continue;
        };
        let (weak, path) = (weak.clone(), path.to_string());
        operands.push(
            with_timeout(
                move || fire_after(weak.clone(), path.clone(), index, delay),
                format!("{key}[{}]", delayed.delay),
                &[],
            )
            .with_backstop(core.config.max_time_promise),
        );
    }
    let violations = evaluator.finish().violations;
    core.diagnostics.extend(violations);

    let (path, key) = (path.to_string(), key.to_string());
    async move {
        match race_promises(&key, operands).await? {
            (_, Ok(chosen)) => Some(Settlement::After { path, chosen }),
            (_, Err(error)) => {
                debug!(branch = %key, %error, "after race ended without transition");
                None
            }
        }
    }
    .boxed()
}

async fn fire_after(weak: Weak<Inner>, path: String, index: usize, delay: Duration) -> Chosen {
    tokio::time::sleep(delay).await;
    let chosen = weak.upgrade().and_then(|inner| {
        let chosen = inner.core.lock().choose_after(&path, index);
        chosen
    });
    match chosen {
        Some(chosen) => chosen,
        None => future::pending().await,
    }
}

/// Race every promise of `path` on snapshots of the contexts and event.
fn promise_race(
    core: &mut Core,
    path: &str,
    key: &str,
    event: &Event,
) -> BoxFuture<'static, Option<Settlement>> {
    let Some(node) = core.flat.get(path) else {
        return future::ready(None).boxed();
    };
    let options: &Options = &core.machine.options;
    let mut evaluator = Evaluator::new(options, event, &core.p_context, &core.context);
    let mut operands: Vec<TimeoutPromise<Result<Value, Value>>> = Vec::new();
    let mut indices = Vec::new();

    for (index, def) in node.promises.iter().enumerate() {
        let Some(source) = options.promises.get(&def.src).cloned() else {
            warn!(branch = %key, src = %def.src, "promise source missing, skipped");
            evaluator.report(Violation::not_defined(Reference::Promise, &def.src));
            continue;
        };
        let mut limits = Vec::new();
        if let Some(max) = &def.max {
            match evaluator.delay(max) {
                Some(limit) => limits.push(limit),
                None => warn!(branch = %key, delay = %max, "promise max delay missing, using default"),
            }
        }
        let (p_context, context, snapshot) =
            (core.p_context.clone(), core.context.clone(), event.clone());
        operands.push(
            with_timeout(
                move || source.call(p_context.clone(), context.clone(), snapshot.clone()),
                format!("{key}[{}]", def.src),
                &limits,
            )
            .with_backstop(core.config.max_time_promise),
        );
        indices.push(index);
    }
    let violations = evaluator.finish().violations;
    core.diagnostics.extend(violations);

    let (path, key) = (path.to_string(), key.to_string());
    async move {
        let (operand, result) = race_promises(&key, operands).await?;
        let outcome = match result {
            Ok(Ok(value)) => PromiseOutcome::Then(value),
            Ok(Err(reason)) => PromiseOutcome::Catch(reason),
            Err(error @ TimeoutError::TimedOut { .. }) => {
                PromiseOutcome::Catch(Value::String(error.to_string()))
            }
            Err(TimeoutError::Aborted { .. }) => return None,
        };
        Some(Settlement::Promise {
            path,
            index: indices[operand],
            outcome,
        })
    }
    .boxed()
}

/// Route a settled race: keep it for later when its address is inactive,
/// drop it when a newer race replaced it, otherwise apply it in order.
fn settle(weak: &Weak<Inner>, key: &str, generation: u64, settlement: Settlement) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    {
        let mut core = inner.core.lock();
        if core.status == Status::Stopped {
            return;
        }
        if !core.flat.contains_key(settlement.path()) {
            debug!(branch = %key, "address inactive, result kept");
            core.remaining.entry(key.to_string()).or_insert(settlement);
            return;
        }
        if core.branches.get(key).map(|branch| branch.generation) != Some(generation) {
            debug!(branch = %key, generation, "superseded result dropped");
            return;
        }
    }

    let key = key.to_string();
    schedule(&inner, move |inner| apply(inner, key, settlement));
}

fn apply(inner: &Arc<Inner>, key: String, settlement: Settlement) {
    {
        let mut core = inner.core.lock();
        if !core.status.is_running() {
            return;
        }
        if !core.flat.contains_key(settlement.path()) {
            core.remaining.entry(key).or_insert(settlement);
            return;
        }
        debug!(branch = %key, "applying race result");
        let changed = core.apply_settlement(settlement);
        if core.observe_step(changed) {
            return;
        }
    }
    next(inner);
    publish(inner);
}
