//! Interpreter error types.

use crate::checkpoint::CheckpointError;
use crate::interpreter::status::Status;
use thiserror::Error;

/// Errors returned by interpreter operations.
#[derive(Debug, Error)]
pub enum InterpreterError {
    /// Newline-joined violations the current mode does not tolerate
    #[error("{0}")]
    Startup(String),

    #[error("No tokio runtime is available to drive timers")]
    NoRuntime,

    #[error("Cannot restore a checkpoint while the interpreter is {0}")]
    NotIdle(Status),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}
