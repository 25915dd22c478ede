//! Runtime tunables for the interpreter.

use crate::enforcement::Mode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delimiter used to build absolute state addresses.
pub const DEFAULT_DELIMITER: &str = "/";

/// Shortest accepted activity period. Also the window used by the
/// self-transition loop guard.
pub const MIN_ACTIVITY_TIME: Duration = Duration::from_millis(10);

/// Longest accepted activity period and the default promise timeout.
pub const MAX_TIME_PROMISE: Duration = Duration::from_millis(100_000);

/// Consecutive fast internal transitions tolerated before the loop guard trips.
pub const MAX_SELF_TRANSITIONS: usize = 100;

/// Configuration shared by an interpreter and the children it spawns.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::config::RuntimeConfig;
/// use mindset_statechart::enforcement::Mode;
/// use std::time::Duration;
///
/// let config = RuntimeConfig::default()
///     .max_self_transitions(20)
///     .max_time_promise(Duration::from_secs(5))
///     .mode(Mode::Strict);
///
/// assert_eq!(config.max_self_transitions, 20);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Lower bound for activity periods and loop guard reset window
    pub min_activity_time: Duration,
    /// Upper bound for activity periods and default promise timeout
    pub max_time_promise: Duration,
    /// Loop guard threshold
    pub max_self_transitions: usize,
    /// Maximum number of history entries kept, `None` keeps everything
    pub history_limit: Option<usize>,
    /// How collected violations are surfaced at start
    pub mode: Mode,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            min_activity_time: MIN_ACTIVITY_TIME,
            max_time_promise: MAX_TIME_PROMISE,
            max_self_transitions: MAX_SELF_TRANSITIONS,
            history_limit: Some(1_000),
            mode: Mode::Normal,
        }
    }
}

impl RuntimeConfig {
    pub fn min_activity_time(mut self, duration: Duration) -> Self {
        self.min_activity_time = duration;
        self
    }

    pub fn max_time_promise(mut self, duration: Duration) -> Self {
        self.max_time_promise = duration;
        self
    }

    pub fn max_self_transitions(mut self, n: usize) -> Self {
        self.max_self_transitions = n;
        self
    }

    pub fn history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let config = RuntimeConfig::default();
        assert_eq!(config.min_activity_time, MIN_ACTIVITY_TIME);
        assert_eq!(config.max_time_promise, MAX_TIME_PROMISE);
        assert_eq!(config.max_self_transitions, MAX_SELF_TRANSITIONS);
        assert_eq!(config.mode, Mode::Normal);
    }

    #[test]
    fn config_serializes_correctly() {
        let config = RuntimeConfig::default().mode(Mode::Strictest);
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RuntimeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }
}
