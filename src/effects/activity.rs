//! Pausable periodic timers backing state activities.
//!
//! Pausing records how much of the current period is left. Resuming re-arms
//! with that remainder once, then the timer goes back to its full period.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

/// Lifecycle of a [`PausableInterval`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntervalStatus {
    Idle,
    Running,
    Paused,
    Stopped,
}

struct Timer {
    status: IntervalStatus,
    deadline: Instant,
    remaining: Duration,
    /// Bumped on every arm. A tick loop from an older arm never fires.
    generation: u64,
    task: Option<JoinHandle<()>>,
}

/// Periodic callback that can be paused without losing its phase.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::effects::PausableInterval;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// let ticks = Arc::new(AtomicUsize::new(0));
/// let counter = ticks.clone();
/// let interval = PausableInterval::new(
///     "/idle::tick",
///     Duration::from_millis(60),
///     tokio::runtime::Handle::current(),
///     move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     },
/// );
///
/// interval.start();
/// tokio::time::sleep(Duration::from_millis(130)).await;
/// interval.pause();
/// tokio::time::sleep(Duration::from_millis(500)).await;
/// assert_eq!(ticks.load(Ordering::SeqCst), 2);
/// # }
/// ```
pub struct PausableInterval {
    id: String,
    period: Duration,
    handle: Handle,
    callback: Arc<dyn Fn() + Send + Sync>,
    timer: Arc<Mutex<Timer>>,
}

impl PausableInterval {
    pub fn new<F>(id: impl Into<String>, period: Duration, handle: Handle, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            period,
            handle,
            callback: Arc::new(callback),
            timer: Arc::new(Mutex::new(Timer {
                status: IntervalStatus::Idle,
                deadline: Instant::now(),
                remaining: period,
                generation: 0,
                task: None,
            })),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn status(&self) -> IntervalStatus {
        self.timer.lock().status
    }

    /// First tick one full period from now. Only from `Idle`.
    pub fn start(&self) {
        let mut timer = self.timer.lock();
        if timer.status != IntervalStatus::Idle {
            return;
        }
        self.arm(&mut timer, self.period);
    }

    pub fn pause(&self) {
        let mut timer = self.timer.lock();
        if timer.status != IntervalStatus::Running {
            return;
        }
        if let Some(task) = timer.task.take() {
            task.abort();
        }
        timer.remaining = timer.deadline.saturating_duration_since(Instant::now());
        timer.status = IntervalStatus::Paused;
        trace!(interval = %self.id, remaining = ?timer.remaining, "interval paused");
    }

    /// Re-arm with the remainder recorded by [`pause`](Self::pause).
    pub fn resume(&self) {
        let mut timer = self.timer.lock();
        if timer.status != IntervalStatus::Paused {
            return;
        }
        let first = timer.remaining;
        self.arm(&mut timer, first);
    }

    /// Terminal.
    pub fn stop(&self) {
        let mut timer = self.timer.lock();
        if let Some(task) = timer.task.take() {
            task.abort();
        }
        timer.status = IntervalStatus::Stopped;
    }

    fn arm(&self, timer: &mut Timer, first: Duration) {
        let deadline = Instant::now() + first;
        timer.deadline = deadline;
        timer.status = IntervalStatus::Running;
        timer.generation += 1;
        timer.task = Some(self.handle.spawn(tick_loop(
            Arc::downgrade(&self.timer),
            self.callback.clone(),
            deadline,
            self.period,
            timer.generation,
        )));
    }
}

async fn tick_loop(
    timer: Weak<Mutex<Timer>>,
    callback: Arc<dyn Fn() + Send + Sync>,
    mut deadline: Instant,
    period: Duration,
    generation: u64,
) {
    loop {
        tokio::time::sleep_until(deadline).await;
        let Some(timer) = timer.upgrade() else {
            return;
        };
        {
            // `abort` lands at the next await, so a loop woken just before a
            // pause or re-arm must not fire.
            let mut timer = timer.lock();
            if timer.status != IntervalStatus::Running || timer.generation != generation {
                trace!(generation, "stale interval tick skipped");
                return;
            }
            deadline += period;
            timer.deadline = deadline;
        }
        callback();
    }
}

impl Drop for PausableInterval {
    fn drop(&mut self) {
        if let Some(task) = self.timer.lock().task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for PausableInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PausableInterval")
            .field("id", &self.id)
            .field("period", &self.period)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(period_ms: u64) -> (PausableInterval, Arc<AtomicUsize>) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let interval = PausableInterval::new(
            "test",
            Duration::from_millis(period_ms),
            Handle::current(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        (interval, ticks)
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_every_period() {
        let (interval, ticks) = counting(60);
        interval.start();
        advance(365).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 6);
        assert_eq!(interval.status(), IntervalStatus::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_uses_remainder_once() {
        let (interval, ticks) = counting(100);
        interval.start();
        advance(130).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        interval.pause();
        assert_eq!(interval.status(), IntervalStatus::Paused);
        advance(1_000).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        // 70ms were left in the period when paused.
        interval.resume();
        advance(75).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        advance(90).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        advance(15).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn woken_loop_does_not_fire_after_pause() {
        let (interval, ticks) = counting(50);
        interval.start();
        let armed = interval.timer.lock().generation;
        interval.pause();

        // A loop whose sleep already elapsed when the pause landed.
        let late = tokio::spawn(tick_loop(
            Arc::downgrade(&interval.timer),
            interval.callback.clone(),
            Instant::now(),
            interval.period,
            armed,
        ));
        late.await.unwrap();
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert_eq!(interval.status(), IntervalStatus::Paused);

        // Same after a resume re-armed the interval.
        interval.resume();
        let late = tokio::spawn(tick_loop(
            Arc::downgrade(&interval.timer),
            interval.callback.clone(),
            Instant::now(),
            interval.period,
            armed,
        ));
        late.await.unwrap();
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        advance(55).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_terminal() {
        let (interval, ticks) = counting(20);
        interval.start();
        interval.stop();
        interval.resume();
        interval.start();
        advance(200).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert_eq!(interval.status(), IntervalStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_the_timer() {
        let (interval, ticks) = counting(20);
        interval.start();
        drop(interval);
        advance(200).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }
}
