//! Snapshot subscriptions.

use crate::interpreter::status::StateSnapshot;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Called with the previous and the current snapshot.
pub type Listener = Arc<dyn Fn(&StateSnapshot, &StateSnapshot) + Send + Sync>;

/// Called with the current snapshot.
pub type EventListener = Arc<dyn Fn(&StateSnapshot) + Send + Sync>;

/// Suppresses a notification when it returns true.
pub type Equals = Arc<dyn Fn(&StateSnapshot, &StateSnapshot) -> bool + Send + Sync>;

/// How a subscriber reacts to a new snapshot.
#[derive(Clone)]
pub enum Reducer {
    /// Every snapshot
    Fn(Listener),
    /// Dispatch on the type of the event that produced the snapshot
    Events {
        handlers: HashMap<String, EventListener>,
        fallback: Option<EventListener>,
    },
}

impl Reducer {
    pub fn new<F>(listener: F) -> Self
    where
        F: Fn(&StateSnapshot, &StateSnapshot) + Send + Sync + 'static,
    {
        Self::Fn(Arc::new(listener))
    }

    /// Empty event map.
    pub fn events() -> Self {
        Self::Events {
            handlers: HashMap::new(),
            fallback: None,
        }
    }

    /// Add a handler for `event`. Turns a function reducer into an event map.
    pub fn on<F>(self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&StateSnapshot) + Send + Sync + 'static,
    {
        let (mut handlers, fallback) = self.into_parts();
        handlers.insert(event.into(), Arc::new(handler));
        Self::Events { handlers, fallback }
    }

    /// Handler for events without a dedicated entry.
    pub fn otherwise<F>(self, handler: F) -> Self
    where
        F: Fn(&StateSnapshot) + Send + Sync + 'static,
    {
        let (handlers, _) = self.into_parts();
        Self::Events {
            handlers,
            fallback: Some(Arc::new(handler)),
        }
    }

    fn into_parts(self) -> (HashMap<String, EventListener>, Option<EventListener>) {
        match self {
            Self::Fn(_) => (HashMap::new(), None),
            Self::Events { handlers, fallback } => (handlers, fallback),
        }
    }

    fn call(&self, previous: &StateSnapshot, current: &StateSnapshot) {
        match self {
            Self::Fn(listener) => listener(previous, current),
            Self::Events { handlers, fallback } => {
                if let Some(handler) = handlers.get(&current.event.kind).or(fallback.as_ref()) {
                    handler(current);
                }
            }
        }
    }
}

impl fmt::Debug for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fn(_) => f.write_str("Reducer::Fn(..)"),
            Self::Events { handlers, fallback } => f
                .debug_struct("Reducer::Events")
                .field("events", &handlers.keys().collect::<Vec<_>>())
                .field("fallback", &fallback.is_some())
                .finish(),
        }
    }
}

/// Options for [`Interpreter::subscribe_with`](crate::interpreter::Interpreter::subscribe_with).
#[derive(Clone, Default)]
pub struct SubscribeOptions {
    pub equals: Option<Equals>,
    /// Random v4 uuid when absent
    pub id: Option<String>,
}

impl SubscribeOptions {
    pub fn equals<F>(mut self, equals: F) -> Self
    where
        F: Fn(&StateSnapshot, &StateSnapshot) -> bool + Send + Sync + 'static,
    {
        self.equals = Some(Arc::new(equals));
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// State of a [`Subscription`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    Paused,
    Disposed,
}

struct Entry {
    id: String,
    reducer: Reducer,
    equals: Option<Equals>,
    state: Mutex<SubscriptionState>,
}

type Registry = Arc<Mutex<Vec<Arc<Entry>>>>;

/// Handle returned by `subscribe`. Dropping it keeps the subscription alive.
#[derive(Clone)]
pub struct Subscription {
    entry: Arc<Entry>,
    registry: Weak<Mutex<Vec<Arc<Entry>>>>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.entry.id
    }

    pub fn state(&self) -> SubscriptionState {
        *self.entry.state.lock()
    }

    /// Stop receiving snapshots until [`open`](Self::open).
    pub fn close(&self) {
        let mut state = self.entry.state.lock();
        if *state == SubscriptionState::Active {
            *state = SubscriptionState::Paused;
        }
    }

    pub fn open(&self) {
        let mut state = self.entry.state.lock();
        if *state == SubscriptionState::Paused {
            *state = SubscriptionState::Active;
        }
    }

    /// Terminal.
    pub fn unsubscribe(&self) {
        *self.entry.state.lock() = SubscriptionState::Disposed;
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .retain(|entry| !Arc::ptr_eq(entry, &self.entry));
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.entry.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Subscribers of one interpreter and the last snapshot they saw.
#[derive(Default)]
pub(crate) struct Subscribers {
    entries: Registry,
    last: Mutex<Option<StateSnapshot>>,
}

impl Subscribers {
    pub(crate) fn add(&self, reducer: Reducer, options: SubscribeOptions) -> Subscription {
        let entry = Arc::new(Entry {
            id: options.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            reducer,
            equals: options.equals,
            state: Mutex::new(SubscriptionState::Active),
        });
        self.entries.lock().push(entry.clone());
        Subscription {
            entry,
            registry: Arc::downgrade(&self.entries),
        }
    }

    /// Deliver `current` to every active subscriber. Callbacks run without
    /// any lock held, so they may subscribe, send or read freely.
    pub(crate) fn notify(&self, current: &StateSnapshot) {
        let previous = self
            .last
            .lock()
            .replace(current.clone())
            .unwrap_or_else(|| current.clone());
        let entries: Vec<Arc<Entry>> = self.entries.lock().clone();
        for entry in entries {
            if *entry.state.lock() != SubscriptionState::Active {
                continue;
            }
            if let Some(equals) = &entry.equals {
                if equals(&previous, current) {
                    continue;
                }
            }
            entry.reducer.call(&previous, current);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
