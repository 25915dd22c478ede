//! The statechart interpreter.
//!
//! An [`Interpreter`] owns one running instance of a [`Machine`]: the active
//! state value, both contexts, cached activity intervals, running `after` and
//! `promises` races, child interpreters and subscribers. Every mutation runs
//! as a task on the interpreter's [`Scheduler`], so two settlements can
//! never interleave inside one step.
//!
//! Timers and races run on the tokio runtime that is current when
//! [`Interpreter::start`] is called.
//!
//! # Example
//!
//! ```rust
//! use mindset_statechart::core::{Node, TransitionDef};
//! use mindset_statechart::effects::{Machine, Options};
//! use mindset_statechart::interpreter::Interpreter;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut idle = Node::atomic();
//! idle.on.insert(
//!     "INC".to_string(),
//!     vec![TransitionDef {
//!         actions: vec!["inc".to_string()],
//!         ..Default::default()
//!     }],
//! );
//! let mut root = Node::compound("idle");
//! root.states.insert("idle".to_string(), idle);
//!
//! let machine = Machine::new(root).with_options(Options::new().assign("inc", |context, _| {
//!     json!({ "count": context["count"].as_i64().unwrap_or(0) + 1 })
//! }));
//!
//! let interpreter = Interpreter::new(machine);
//! interpreter
//!     .provide_context(json!({ "count": 0 }))
//!     .provide_private_context(json!({}));
//! interpreter.start().unwrap();
//!
//! interpreter.send("INC");
//! interpreter.send("INC");
//! assert_eq!(interpreter.select("count"), Some(json!(2)));
//! # }
//! ```

mod branch;
mod child;
mod core;
mod cycle;
pub mod error;
pub mod status;
pub mod subscription;

pub use error::InterpreterError;
pub use status::{StateSnapshot, Status};
pub use subscription::{Reducer, SubscribeOptions, Subscription, SubscriptionState};

use crate::checkpoint::Checkpoint;
use crate::config::RuntimeConfig;
use crate::core::{select, Event, FlatIndex, StateHistory, StateValue};
use crate::effects::{Machine, Options, Scheduler};
use crate::enforcement::{describe, enforce, Mode, Violation};
use self::core::Core;
use self::subscription::Subscribers;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use stillwater::validation::Validation;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

pub(crate) struct Inner {
    pub(crate) core: Mutex<Core>,
    pub(crate) scheduler: Scheduler,
    pub(crate) subscribers: Subscribers,
    pub(crate) children: Mutex<BTreeMap<String, Interpreter>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.core.get_mut().teardown();
    }
}

/// Handle to a running statechart. Clones share the same instance.
#[derive(Clone)]
pub struct Interpreter {
    inner: Arc<Inner>,
}

impl Interpreter {
    pub fn new(machine: Machine) -> Self {
        Self::with_config(machine, RuntimeConfig::default())
    }

    pub fn with_config(machine: Machine, config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                core: Mutex::new(Core::new(machine, config)),
                scheduler: Scheduler::new(),
                subscribers: Subscribers::default(),
                children: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// Set the public context. Required before [`start`](Self::start).
    pub fn provide_context(&self, context: Value) -> &Self {
        let mut core = self.inner.core.lock();
        core.context = context;
        core.context_provided = true;
        self
    }

    /// Set the private context. Required before [`start`](Self::start).
    pub fn provide_private_context(&self, p_context: Value) -> &Self {
        let mut core = self.inner.core.lock();
        core.p_context = p_context;
        core.p_context_provided = true;
        self
    }

    /// Validate the machine, enter the initial configuration and start the
    /// children. Does nothing unless idle.
    ///
    /// Fails with [`InterpreterError::Startup`] when the mode does not
    /// tolerate the collected violations, and with
    /// [`InterpreterError::NoRuntime`] outside a tokio runtime.
    pub fn start(&self) -> Result<(), InterpreterError> {
        let runtime = Handle::try_current().map_err(|_| InterpreterError::NoRuntime)?;
        {
            let mut guard = self.inner.core.lock();
            let core = &mut *guard;
            if core.status != Status::Idle {
                return Ok(());
            }
            if !core.context_provided {
                core.diagnostics.record(Violation::NoContext);
            }
            if !core.p_context_provided {
                core.diagnostics.record(Violation::NoPrivateContext);
            }
            let missing = core.machine.missing_references();
            core.diagnostics.extend(missing);

            if let Validation::Failure(violations) = enforce(core.config.mode, &core.diagnostics) {
                return Err(InterpreterError::Startup(describe(&violations)));
            }

            core.runtime = Some(runtime);
            core.initialize();
            core.status = Status::Starting;
            info!(value = %core.value, mode = ?core.config.mode, "starting interpreter");
        }

        child::start_children(&self.inner);

        let weak = Arc::downgrade(&self.inner);
        self.inner.scheduler.initialize(Some(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                cycle::enter(&inner);
            }
        })));
        Ok(())
    }

    /// Deliver an event. Ignored unless running, rejected while another
    /// event is being evaluated.
    pub fn send(&self, event: impl Into<Event>) {
        let event = event.into();
        {
            let core = self.inner.core.lock();
            if core.status == Status::Sending {
                warn!(event = %event.kind, "send rejected while another event is evaluated");
                return;
            }
            if !core.status.accepts_events() {
                debug!(event = %event.kind, status = %core.status, "event ignored");
                return;
            }
        }
        cycle::schedule(&self.inner, move |inner| cycle::process(inner, event));
    }

    /// Pause timers, the scheduler and every child. Queued work is kept.
    pub fn pause(&self) {
        {
            let mut core = self.inner.core.lock();
            if !core.status.is_running() {
                return;
            }
            core.status = Status::Paused;
            core.pause_intervals();
        }
        self.inner.scheduler.pause();
        for child in self.children() {
            child.pause();
        }
        debug!("interpreter paused");
    }

    /// Resume a paused interpreter and its children.
    pub fn resume(&self) {
        {
            let mut core = self.inner.core.lock();
            if core.status != Status::Paused {
                return;
            }
            core.status = Status::Working;
        }
        self.inner.scheduler.resume();
        for child in self.children() {
            child.resume();
        }
        cycle::schedule(&self.inner, |inner| {
            cycle::next(inner);
            cycle::publish(inner);
        });
        debug!("interpreter resumed");
    }

    /// Terminal. Releases every timer and race, stops the children and
    /// notifies subscribers one last time.
    pub fn stop(&self) {
        let snapshot = {
            let mut core = self.inner.core.lock();
            if core.status == Status::Stopped {
                return;
            }
            core.status = Status::Stopped;
            core.teardown();
            core.snapshot()
        };
        self.inner.scheduler.stop();
        for child in self.children() {
            child.stop();
        }
        self.inner.subscribers.notify(&snapshot);
        info!("interpreter stopped");
    }

    /// Alias of [`stop`](Self::stop).
    pub fn dispose(&self) {
        self.stop();
    }

    /// Read a dot path of the public context.
    pub fn select(&self, path: &str) -> Option<Value> {
        select(&self.inner.core.lock().context, path).cloned()
    }

    /// Read a dot path of the private context.
    pub fn p_select(&self, path: &str) -> Option<Value> {
        select(&self.inner.core.lock().p_context, path).cloned()
    }

    pub fn value(&self) -> StateValue {
        self.inner.core.lock().value.clone()
    }

    pub fn context(&self) -> Value {
        self.inner.core.lock().context.clone()
    }

    pub fn p_context(&self) -> Value {
        self.inner.core.lock().p_context.clone()
    }

    pub fn status(&self) -> Status {
        self.inner.core.lock().status
    }

    /// Last event evaluated, including synthetic promise events.
    pub fn event(&self) -> Event {
        self.inner.core.lock().event.clone()
    }

    pub fn tags(&self) -> Vec<String> {
        self.inner.core.lock().tags()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.inner.core.lock().snapshot()
    }

    /// True when `path` is inside the active state value.
    pub fn matches(&self, path: &str) -> bool {
        self.inner.core.lock().value.contains_path(path)
    }

    /// Active addresses and their nodes.
    pub fn flat(&self) -> FlatIndex {
        self.inner.core.lock().flat.clone()
    }

    pub fn history(&self) -> StateHistory {
        self.inner.core.lock().history.clone()
    }

    pub fn config(&self) -> RuntimeConfig {
        self.inner.core.lock().config.clone()
    }

    /// Call `listener` with the previous and the current snapshot after
    /// every step.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StateSnapshot, &StateSnapshot) + Send + Sync + 'static,
    {
        self.subscribe_with(Reducer::new(listener), SubscribeOptions::default())
    }

    pub fn subscribe_with(&self, reducer: Reducer, options: SubscribeOptions) -> Subscription {
        self.inner.subscribers.add(reducer, options)
    }

    /// Add or replace implementations. Rejected once stopped.
    pub fn add_options<F>(&self, update: F)
    where
        F: FnOnce(&mut Options),
    {
        let mut core = self.inner.core.lock();
        if core.status == Status::Stopped {
            warn!("options cannot change on a stopped interpreter");
            return;
        }
        update(&mut core.machine.options);
    }

    pub fn mode(&self) -> Mode {
        self.inner.core.lock().config.mode
    }

    /// Takes effect on the next [`start`](Self::start).
    pub fn set_mode(&self, mode: Mode) {
        self.inner.core.lock().config.mode = mode;
    }

    /// Distinct warning messages recorded so far.
    pub fn warnings(&self) -> Vec<String> {
        self.inner.core.lock().diagnostics.warnings()
    }

    /// Distinct error messages recorded so far.
    pub fn errors(&self) -> Vec<String> {
        self.inner.core.lock().diagnostics.errors()
    }

    /// A started child, by binding id.
    pub fn child(&self, id: &str) -> Option<Interpreter> {
        self.inner.children.lock().get(id).cloned()
    }

    fn children(&self) -> Vec<Interpreter> {
        self.inner.children.lock().values().cloned().collect()
    }

    /// Capture the runtime state.
    pub fn checkpoint(&self) -> Checkpoint {
        let core = self.inner.core.lock();
        Checkpoint::new(
            core.value.clone(),
            core.context.clone(),
            core.p_context.clone(),
            core.event.clone(),
            core.history.clone(),
        )
    }

    /// Resume from `checkpoint` on the next [`start`](Self::start). Entry
    /// actions of the restored configuration do not run again.
    pub fn restore(&self, checkpoint: Checkpoint) -> Result<(), InterpreterError> {
        checkpoint.validate()?;
        let mut core = self.inner.core.lock();
        if core.status != Status::Idle {
            return Err(InterpreterError::NotIdle(core.status));
        }
        core.value = checkpoint.value;
        core.context = checkpoint.context;
        core.p_context = checkpoint.p_context;
        core.context_provided = true;
        core.p_context_provided = true;
        core.event = checkpoint.event;
        core.history = checkpoint.history;
        core.restored = true;
        debug!(checkpoint = %checkpoint.id, value = %core.value, "checkpoint restored");
        Ok(())
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("Interpreter")
            .field("status", &core.status)
            .field("value", &core.value)
            .field("context", &core.context)
            .field("subscribers", &self.inner.subscribers.len())
            .finish()
    }
}
