//! Violations collected while starting and running an interpreter.

use std::fmt;
use thiserror::Error;

/// Kind of option referenced by name from a state tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reference {
    Action,
    Predicate,
    Delay,
    Promise,
    Machine,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Action => "Action",
            Self::Predicate => "Predicate",
            Self::Delay => "Delay",
            Self::Promise => "Promise",
            Self::Machine => "Machine",
        };
        f.write_str(name)
    }
}

/// How a violation is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Recorded, never halts
    Warning,
    /// Recorded, fails startup in strict modes
    Error,
}

/// Every problem an interpreter can record.
#[derive(Debug, Clone, Error, PartialEq, Eq, Hash)]
pub enum Violation {
    #[error("{kind} ({name}) is not defined")]
    NotDefined { kind: Reference, name: String },

    #[error("{key} is too short")]
    TooShort { key: String },

    #[error("{key} is too long")]
    TooLong { key: String },

    #[error("No context provided")]
    NoContext,

    #[error("No private context provided")]
    NoPrivateContext,

    #[error("Too many self transitions, exceeded {max} transitions")]
    TooManySelfTransitions { max: usize },

    #[error("Child machine {id} failed to start: {reason}")]
    ChildStartup { id: String, reason: String },
}

impl Violation {
    pub fn not_defined(kind: Reference, name: impl Into<String>) -> Self {
        Self::NotDefined {
            kind,
            name: name.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::NotDefined { .. } | Self::TooShort { .. } | Self::TooLong { .. } => {
                Severity::Warning
            }
            Self::NoContext
            | Self::NoPrivateContext
            | Self::TooManySelfTransitions { .. }
            | Self::ChildStartup { .. } => Severity::Error,
        }
    }

    pub fn is_warning(&self) -> bool {
        self.severity() == Severity::Warning
    }
}
