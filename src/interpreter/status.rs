//! Interpreter lifecycle and observable snapshots.

use crate::core::{Event, StateValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Interpreter lifecycle.
///
/// `idle → starting → started → (working ⇄ sending ⇄ busy) → paused → … → stopped`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Idle,
    Starting,
    Started,
    Working,
    /// Evaluating an external event; new sends are rejected
    Sending,
    /// Running the internal cycle
    Busy,
    Paused,
    /// Terminal
    Stopped,
}

impl Status {
    /// Started and neither paused nor stopped.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            Self::Started | Self::Working | Self::Sending | Self::Busy
        )
    }

    /// Statuses in which `send` schedules the event.
    pub fn accepts_events(&self) -> bool {
        matches!(self, Self::Started | Self::Working | Self::Busy)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Started => "started",
            Self::Working => "working",
            Self::Sending => "sending",
            Self::Busy => "busy",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// What subscribers observe after every step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub value: StateValue,
    pub context: Value,
    pub event: Event,
    pub status: Status,
    /// Tags of every active node, in path order
    pub tags: Vec<String>,
}

impl StateSnapshot {
    pub fn matches(&self, path: &str) -> bool {
        self.value.contains_path(path)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_settled_statuses_accept_events() {
        assert!(Status::Working.accepts_events());
        assert!(!Status::Sending.accepts_events());
        assert!(!Status::Paused.accepts_events());
        assert!(Status::Sending.is_running());
        assert!(!Status::Stopped.is_running());
    }

    #[test]
    fn status_displays_lowercase() {
        assert_eq!(Status::Busy.to_string(), "busy");
        assert_eq!(serde_json::to_string(&Status::Stopped).unwrap(), "\"stopped\"");
    }
}
