//! Validation-based enforcement of interpreter diagnostics.
//!
//! Missing option references and out-of-range activity periods are
//! warnings; missing contexts and runaway self-transition loops are errors.
//! Both are collected in deduplicating [`Diagnostics`]. At startup,
//! [`enforce`] uses Stillwater's `Validation` to accumulate ALL violations
//! the current [`Mode`] does not tolerate instead of stopping at the first.
//!
//! # Example
//!
//! ```rust
//! use mindset_statechart::enforcement::{enforce, describe, Diagnostics, Mode, Violation};
//! use stillwater::validation::Validation;
//!
//! let mut diagnostics = Diagnostics::default();
//! diagnostics.record(Violation::NoContext);
//! diagnostics.record(Violation::NoPrivateContext);
//!
//! match enforce(Mode::Strict, &diagnostics) {
//!     Validation::Failure(errors) => assert_eq!(
//!         describe(&errors),
//!         "No context provided\nNo private context provided"
//!     ),
//!     Validation::Success(_) => unreachable!(),
//! }
//! ```

pub mod collector;
pub mod rules;
pub mod violations;

pub use collector::Diagnostics;
pub use rules::{describe, enforce, Mode};
pub use violations::{Reference, Severity, Violation};
