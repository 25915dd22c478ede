//! Cancelable timeouts and promise races.
//!
//! [`with_timeout`] wraps a future factory so every run races the work
//! against the smallest supplied timeout (plus a backstop, [`MAX_TIME_PROMISE`]
//! unless replaced) and an abort signal. [`race_promises`] runs several wrapped
//! operations and aborts every operand once the first one settles.

use crate::config::MAX_TIME_PROMISE;
use futures::future::{select_all, BoxFuture};
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Reasons a wrapped operation did not produce its own value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimeoutError {
    #[error("{id} timed out after {}ms", .after.as_millis())]
    TimedOut { id: String, after: Duration },

    #[error("{id} was aborted")]
    Aborted { id: String },
}

type Factory<T> = Arc<dyn Fn() -> BoxFuture<'static, T> + Send + Sync>;

/// Operation bounded by a timeout and an abort signal.
pub struct TimeoutPromise<T> {
    id: String,
    factory: Factory<T>,
    token: CancellationToken,
    /// Smallest caller-supplied timeout
    requested: Option<Duration>,
    limit: Duration,
}

/// Wrap `factory` with the smallest of `timeouts` and the backstop.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::effects::{with_timeout, TimeoutError};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// let slow = with_timeout(
///     || async {
///         tokio::time::sleep(Duration::from_secs(10)).await;
///         42
///     },
///     "slow",
///     &[Duration::from_millis(50)],
/// );
///
/// assert!(matches!(slow.run().await, Err(TimeoutError::TimedOut { .. })));
/// # }
/// ```
pub fn with_timeout<T, F, Fut>(
    factory: F,
    id: impl Into<String>,
    timeouts: &[Duration],
) -> TimeoutPromise<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let requested = timeouts.iter().copied().min();
    TimeoutPromise {
        id: id.into(),
        factory: Arc::new(move || factory().boxed()),
        token: CancellationToken::new(),
        requested,
        limit: requested.map_or(MAX_TIME_PROMISE, |r| r.min(MAX_TIME_PROMISE)),
    }
}

impl<T: Send + 'static> TimeoutPromise<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Effective timeout of every run.
    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Replace the [`MAX_TIME_PROMISE`] backstop.
    pub fn with_backstop(mut self, backstop: Duration) -> Self {
        self.limit = self.requested.map_or(backstop, |r| r.min(backstop));
        self
    }

    /// Reject pending and future runs with [`TimeoutError::Aborted`].
    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Start the operation. Nothing runs until the returned future is polled.
    pub fn run(&self) -> BoxFuture<'static, Result<T, TimeoutError>> {
        let work = (self.factory)();
        let token = self.token.clone();
        let limit = self.limit;
        let id = self.id.clone();
        async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(TimeoutError::Aborted { id: id.clone() }),
                _ = tokio::time::sleep(limit) => Err(TimeoutError::TimedOut { id: id.clone(), after: limit }),
                value = work => Ok(value),
            }
        }
        .boxed()
    }
}

/// Run every operand and return the index and result of the first to settle.
///
/// Every operand is aborted when the race ends, including when the returned
/// future is dropped before completion. `None` for an empty race.
///
/// ```rust
/// use mindset_statechart::effects::{race_promises, with_timeout};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// let fast = with_timeout(|| async { "fast" }, "fast", &[]);
/// let slow = with_timeout(
///     || async {
///         tokio::time::sleep(Duration::from_millis(30)).await;
///         "slow"
///     },
///     "slow",
///     &[],
/// );
///
/// let (index, result) = race_promises("demo", vec![fast, slow]).await.unwrap();
/// assert_eq!((index, result.unwrap()), (0, "fast"));
/// # }
/// ```
pub async fn race_promises<T: Send + 'static>(
    id: &str,
    operands: Vec<TimeoutPromise<T>>,
) -> Option<(usize, Result<T, TimeoutError>)> {
    if operands.is_empty() {
        return None;
    }
    let _abort = AbortAll(operands.iter().map(|o| o.token.clone()).collect());
    let runs: Vec<_> = operands.iter().map(TimeoutPromise::run).collect();
    let (result, index, _losers) = select_all(runs).await;
    debug!(race = id, winner = operands[index].id(), "race settled");
    Some((index, result))
}

struct AbortAll(Vec<CancellationToken>);

impl Drop for AbortAll {
    fn drop(&mut self) {
        for token in &self.0 {
            token.cancel();
        }
    }
}
