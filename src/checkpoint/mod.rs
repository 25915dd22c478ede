//! Checkpoint and resume functionality for interpreters.
//!
//! A checkpoint captures the runtime state of an interpreter: the active
//! state value, both contexts, the last event and the transition history.
//! The machine definition itself (node tree and implementations) is not
//! serialized; a checkpoint is restored into an interpreter built from the
//! same machine.

use crate::core::{Event, StateHistory, StateValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod error;

pub use error::CheckpointError;

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serializable runtime state of an interpreter.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::checkpoint::Checkpoint;
/// use mindset_statechart::core::{Event, StateHistory, StateValue};
/// use serde_json::json;
///
/// let checkpoint = Checkpoint::new(
///     StateValue::from("busy"),
///     json!({ "count": 2 }),
///     json!({}),
///     Event::new("START"),
///     StateHistory::new(),
/// );
///
/// let json = checkpoint.to_json().unwrap();
/// let restored = Checkpoint::from_json(&json).unwrap();
/// assert_eq!(restored, checkpoint);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint format version
    pub version: u32,

    /// Unique checkpoint identifier
    pub id: String,

    /// When checkpoint was created
    pub timestamp: DateTime<Utc>,

    /// Active state value
    pub value: StateValue,

    /// Public context
    pub context: Value,

    /// Private context
    pub p_context: Value,

    /// Last event processed
    pub event: Event,

    /// Complete transition history
    pub history: StateHistory,
}

impl Checkpoint {
    pub fn new(
        value: StateValue,
        context: Value,
        p_context: Value,
        event: Event,
        history: StateHistory,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            value,
            context,
            p_context,
            event,
            history,
        }
    }

    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    /// Parse and validate a checkpoint.
    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Self = serde_json::from_str(json)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    pub fn validate(&self) -> Result<(), CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                supported: CHECKPOINT_VERSION,
            });
        }
        if self.value.is_empty() {
            return Err(CheckpointError::ValidationFailed(
                "state value is empty".to_string(),
            ));
        }
        Ok(())
    }
}
