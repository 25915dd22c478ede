//! Startup enforcement using Validation.

use crate::enforcement::collector::Diagnostics;
use crate::enforcement::violations::Violation;
use serde::{Deserialize, Serialize};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// How collected violations are surfaced when an interpreter starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Log everything, never fail
    #[default]
    Normal,
    /// Fail on errors, log warnings
    Strict,
    /// Fail on errors and warnings
    Strictest,
}

/// Check the collected diagnostics against `mode`, accumulating ALL
/// violations that the mode does not tolerate.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::enforcement::{enforce, Diagnostics, Mode, Reference, Violation};
///
/// let mut diagnostics = Diagnostics::default();
/// diagnostics.record(Violation::not_defined(Reference::Action, "inc"));
///
/// assert!(enforce(Mode::Strict, &diagnostics).is_success());
/// assert!(enforce(Mode::Strictest, &diagnostics).is_failure());
/// ```
pub fn enforce(mode: Mode, diagnostics: &Diagnostics) -> Validation<(), NonEmptyVec<Violation>> {
    let considered: Vec<&Violation> = match mode {
        Mode::Normal => Vec::new(),
        Mode::Strict => diagnostics.error_violations().iter().collect(),
        Mode::Strictest => diagnostics
            .error_violations()
            .iter()
            .chain(diagnostics.warning_violations())
            .collect(),
    };

    let checks: Vec<Validation<(), NonEmptyVec<Violation>>> = considered
        .into_iter()
        .map(|violation| Validation::fail(violation.clone()))
        .collect();

    Validation::all_vec(checks).map(|_| ())
}

/// Newline-joined messages of a failed enforcement.
pub fn describe(violations: &NonEmptyVec<Violation>) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
