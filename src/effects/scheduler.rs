//! Cooperative FIFO scheduler serializing every side effect of an interpreter.
//!
//! Only one task runs at a time. A task scheduled while another one is
//! running is appended to the queue and runs after the current task returns,
//! in submission order. The lock is never held while a task runs, so tasks
//! may schedule further tasks freely.

use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::trace;

/// Unit of work executed by the scheduler.
pub type Task = Box<dyn FnOnce() + Send>;

/// Lifecycle of a [`Scheduler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerStatus {
    Idle,
    Initialized,
    Processing,
    Paused,
    Working,
    Stopped,
}

struct State {
    status: SchedulerStatus,
    queue: VecDeque<Task>,
    draining: bool,
}

/// FIFO effect queue.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::effects::Scheduler;
/// use std::sync::{Arc, Mutex};
///
/// let scheduler = Arc::new(Scheduler::new());
/// let order = Arc::new(Mutex::new(Vec::new()));
///
/// scheduler.initialize(None);
///
/// let inner = scheduler.clone();
/// let log = order.clone();
/// scheduler.schedule(Box::new(move || {
///     log.lock().unwrap().push("outer:start");
///     let nested = log.clone();
///     inner.schedule(Box::new(move || nested.lock().unwrap().push("nested")));
///     log.lock().unwrap().push("outer:end");
/// }));
///
/// assert_eq!(*order.lock().unwrap(), vec!["outer:start", "outer:end", "nested"]);
/// ```
pub struct Scheduler {
    state: Mutex<State>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                status: SchedulerStatus::Idle,
                queue: VecDeque::new(),
                draining: false,
            }),
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        self.state.lock().status
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Leave `Idle`, run `callback` first, then everything queued so far.
    /// No-op in any other status.
    pub fn initialize(&self, callback: Option<Task>) {
        {
            let mut state = self.state.lock();
            if state.status != SchedulerStatus::Idle {
                return;
            }
            state.status = SchedulerStatus::Initialized;
            if let Some(callback) = callback {
                state.queue.push_front(callback);
            }
        }
        self.drain();
    }

    /// Run `task` now, or queue it when a task is already running or the
    /// scheduler is idle or paused. Dropped once stopped.
    pub fn schedule(&self, task: Task) {
        {
            let mut state = self.state.lock();
            match state.status {
                SchedulerStatus::Stopped => {
                    trace!("scheduler stopped, task dropped");
                    return;
                }
                SchedulerStatus::Idle | SchedulerStatus::Paused => {
                    state.queue.push_back(task);
                    return;
                }
                _ if state.draining => {
                    state.queue.push_back(task);
                    return;
                }
                _ => state.queue.push_back(task),
            }
        }
        self.drain();
    }

    /// Stop draining after the current task. Queued tasks are kept.
    pub fn pause(&self) {
        let mut state = self.state.lock();
        if state.status != SchedulerStatus::Stopped {
            state.status = SchedulerStatus::Paused;
        }
    }

    /// Leave `Paused` and flush the queue.
    pub fn resume(&self) {
        {
            let mut state = self.state.lock();
            if state.status != SchedulerStatus::Paused {
                return;
            }
            state.status = SchedulerStatus::Working;
        }
        self.drain();
    }

    /// Terminal: clears the queue and rejects every later task.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.status = SchedulerStatus::Stopped;
        state.queue.clear();
    }

    fn drain(&self) {
        {
            let mut state = self.state.lock();
            if state.draining {
                return;
            }
            state.draining = true;
        }
        let _guard = DrainGuard(self);

        loop {
            let task = {
                let mut state = self.state.lock();
                let task = match state.status {
                    SchedulerStatus::Stopped => {
                        state.queue.clear();
                        None
                    }
                    SchedulerStatus::Paused | SchedulerStatus::Idle => None,
                    _ => state.queue.pop_front(),
                };
                match task {
                    Some(task) => {
                        state.status = SchedulerStatus::Processing;
                        task
                    }
                    None => {
                        if matches!(
                            state.status,
                            SchedulerStatus::Initialized | SchedulerStatus::Processing
                        ) {
                            state.status = SchedulerStatus::Working;
                        }
                        // Cleared under the lock that saw the queue empty. A
                        // concurrent `schedule` after this point drains itself.
                        state.draining = false;
                        return;
                    }
                }
            };
            task();
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the draining flag when a task panics.
struct DrainGuard<'a>(&'a Scheduler);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.state.lock().draining = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn recorder() -> (Arc<parking_lot::Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let handle = log.clone();
        let make = move |name: &'static str| -> Task {
            let log = handle.clone();
            Box::new(move || log.lock().push(name))
        };
        (log, make)
    }

    #[test]
    fn tasks_wait_until_initialized() {
        let (log, task) = recorder();
        let scheduler = Scheduler::new();

        scheduler.schedule(task("a"));
        scheduler.schedule(task("b"));
        assert!(log.lock().is_empty());
        assert_eq!(scheduler.pending(), 2);

        scheduler.initialize(Some(task("init")));
        assert_eq!(*log.lock(), vec!["init", "a", "b"]);
        assert_eq!(scheduler.status(), SchedulerStatus::Working);
    }

    #[test]
    fn initialize_is_a_no_op_twice() {
        let (log, task) = recorder();
        let scheduler = Scheduler::new();
        scheduler.initialize(None);
        scheduler.initialize(Some(task("again")));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn nested_tasks_run_after_current_in_fifo_order() {
        let scheduler = Arc::new(Scheduler::new());
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        scheduler.initialize(None);

        let inner = scheduler.clone();
        let outer_log = log.clone();
        scheduler.schedule(Box::new(move || {
            outer_log.lock().push("current:start");
            let a = outer_log.clone();
            inner.schedule(Box::new(move || a.lock().push("A")));
            let b = outer_log.clone();
            inner.schedule(Box::new(move || b.lock().push("B")));
            outer_log.lock().push("current:end");
        }));

        assert_eq!(*log.lock(), vec!["current:start", "current:end", "A", "B"]);
    }

    #[test]
    fn paused_scheduler_keeps_queue_until_resumed() {
        let (log, task) = recorder();
        let scheduler = Scheduler::new();
        scheduler.initialize(None);
        scheduler.pause();

        scheduler.schedule(task("queued"));
        assert!(log.lock().is_empty());

        scheduler.resume();
        assert_eq!(*log.lock(), vec!["queued"]);
    }

    #[test]
    fn pause_from_inside_a_task_stops_the_flush() {
        let scheduler = Arc::new(Scheduler::new());
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        scheduler.initialize(None);

        let inner = scheduler.clone();
        let first = log.clone();
        scheduler.schedule(Box::new(move || {
            let later = first.clone();
            inner.schedule(Box::new(move || later.lock().push("later")));
            inner.pause();
            first.lock().push("first");
        }));

        assert_eq!(*log.lock(), vec!["first"]);
        assert_eq!(scheduler.pending(), 1);
        scheduler.resume();
        assert_eq!(*log.lock(), vec!["first", "later"]);
    }

    #[test]
    fn concurrent_schedules_are_never_stranded() {
        let scheduler = Arc::new(Scheduler::new());
        let ran = Arc::new(AtomicUsize::new(0));
        scheduler.initialize(None);

        let threads = 8;
        let per_thread = 500;
        std::thread::scope(|scope| {
            for _ in 0..threads {
                let scheduler = scheduler.clone();
                let ran = ran.clone();
                scope.spawn(move || {
                    for _ in 0..per_thread {
                        let ran = ran.clone();
                        scheduler.schedule(Box::new(move || {
                            ran.fetch_add(1, Ordering::SeqCst);
                        }));
                    }
                });
            }
        });

        assert_eq!(ran.load(Ordering::SeqCst), threads * per_thread);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.status(), SchedulerStatus::Working);
    }

    #[test]
    fn panicking_task_does_not_wedge_the_queue() {
        let (log, task) = recorder();
        let scheduler = Scheduler::new();
        scheduler.initialize(None);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            scheduler.schedule(Box::new(|| panic!("task failed")));
        }));
        assert!(outcome.is_err());

        scheduler.schedule(task("after"));
        assert_eq!(*log.lock(), vec!["after"]);
    }

    #[test]
    fn stop_clears_queue_and_rejects_tasks() {
        let (log, task) = recorder();
        let scheduler = Scheduler::new();
        scheduler.schedule(task("never"));
        scheduler.stop();
        scheduler.initialize(None);
        scheduler.schedule(task("rejected"));

        assert!(log.lock().is_empty());
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.status(), SchedulerStatus::Stopped);
    }
}
