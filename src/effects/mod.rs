//! The imperative shell around the pure core.
//!
//! Everything here owns time or ordering:
//!
//! - **Scheduler**: FIFO queue serializing every side effect
//! - **Timeouts**: cancelable time bounds and first-settled races
//! - **Activities**: pausable periodic timers
//! - **Promises**: async sources behind `promises` branches
//! - **Transitions**: guard, action and delay evaluation over working contexts
//! - **Machine**: a node tree plus its named implementations and children

mod activity;
mod machine;
mod promise;
mod scheduler;
mod timeout;
mod transition;

pub use activity::{IntervalStatus, PausableInterval};
pub use machine::{
    ChildBinding, ChildMachine, ChildPaths, ChildSubscription, ContextMapping, EventFilter,
    Machine, Options,
};
pub use promise::{PromiseFuture, PromiseSource};
pub use scheduler::{Scheduler, SchedulerStatus, Task};
pub use timeout::{race_promises, with_timeout, TimeoutError, TimeoutPromise};
pub use transition::{
    propose, select_after, select_always, select_on, Chosen, Evaluator, Outcome,
};
