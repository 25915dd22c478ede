//! Deduplicating collectors for warnings and errors.

use crate::enforcement::violations::{Severity, Violation};
use tracing::{error, warn};

/// Warnings and errors recorded by an interpreter, each reported once.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::enforcement::{Diagnostics, Reference, Violation};
///
/// let mut diagnostics = Diagnostics::default();
/// assert!(diagnostics.record(Violation::not_defined(Reference::Action, "inc")));
/// assert!(!diagnostics.record(Violation::not_defined(Reference::Action, "inc")));
/// assert_eq!(diagnostics.warnings(), vec!["Action (inc) is not defined"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Violation>,
    errors: Vec<Violation>,
}

impl Diagnostics {
    /// Store `violation` unless an identical one is already present.
    /// Returns true when it was new.
    pub fn record(&mut self, violation: Violation) -> bool {
        let bucket = match violation.severity() {
            Severity::Warning => &mut self.warnings,
            Severity::Error => &mut self.errors,
        };
        if bucket.contains(&violation) {
            return false;
        }
        match violation.severity() {
            Severity::Warning => warn!("{violation}"),
            Severity::Error => error!("{violation}"),
        }
        bucket.push(violation);
        true
    }

    pub fn extend(&mut self, violations: impl IntoIterator<Item = Violation>) {
        for violation in violations {
            self.record(violation);
        }
    }

    pub fn warning_violations(&self) -> &[Violation] {
        &self.warnings
    }

    pub fn error_violations(&self) -> &[Violation] {
        &self.errors
    }

    /// Warning messages in recording order.
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }

    /// Error messages in recording order.
    pub fn errors(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }

    pub fn clear(&mut self) {
        self.warnings.clear();
        self.errors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enforcement::violations::Reference;

    #[test]
    fn violations_are_split_by_severity() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.extend([
            Violation::NoContext,
            Violation::not_defined(Reference::Delay, "tick"),
            Violation::NoContext,
        ]);

        assert_eq!(diagnostics.errors(), vec!["No context provided"]);
        assert_eq!(diagnostics.warnings(), vec!["Delay (tick) is not defined"]);
    }

    #[test]
    fn clear_empties_both_collectors() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.record(Violation::NoPrivateContext);
        diagnostics.clear();
        assert!(diagnostics.is_empty());
    }
}
