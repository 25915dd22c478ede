//! Mindset Statechart: a hierarchical statechart interpreter
//!
//! Built on Stillwater's "pure core, imperative shell" philosophy. The value
//! algebra, node resolution, guards, actions and context merging are pure
//! functions in [`core`]; everything that owns time or ordering (the FIFO
//! scheduler, pausable activity timers, timeout races, promise sources) lives
//! in [`effects`] and is driven by the [`interpreter`].
//!
//! # Core Concepts
//!
//! - **State values**: leaf keys and region maps describing the active configuration
//! - **Nodes**: atomic, compound and parallel states referencing implementations by name
//! - **Transitions**: `on` events, eventless `always`, delayed `after` and async `promises`
//! - **Activities**: actions repeated on a pausable interval while a state is active
//! - **Enforcement**: missing implementations and runtime problems collected as
//!   violations and surfaced according to a [`Mode`]
//! - **History & checkpoints**: every value change recorded, runtime state serializable
//!
//! # Example
//!
//! ```rust
//! use mindset_statechart::builder::{MachineBuilder, NodeBuilder, TransitionBuilder};
//! use mindset_statechart::effects::Options;
//! use mindset_statechart::{state_value, Interpreter};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let machine = MachineBuilder::new()
//!     .root(
//!         NodeBuilder::compound("idle")
//!             .state(
//!                 "idle",
//!                 NodeBuilder::atomic().on(
//!                     "SUBMIT",
//!                     TransitionBuilder::to("/done").guard("hasName").action("greet"),
//!                 ),
//!             )
//!             .state("done", NodeBuilder::atomic()),
//!     )
//!     .options(
//!         Options::new()
//!             .predicate("hasName", |_, _, event| event.payload["name"].is_string())
//!             .assign("greet", |_, event| json!({ "greeting": format!("hi {}", event.payload["name"].as_str().unwrap_or_default()) })),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let interpreter = Interpreter::new(machine);
//! interpreter
//!     .provide_context(json!({}))
//!     .provide_private_context(json!({}));
//! interpreter.start().unwrap();
//!
//! interpreter.send(mindset_statechart::core::Event::with_payload("SUBMIT", json!({ "name": "ada" })));
//!
//! assert_eq!(interpreter.value(), state_value!("done"));
//! assert_eq!(interpreter.select("greeting"), Some(json!("hi ada")));
//! assert_eq!(interpreter.history().len(), 1);
//! # }
//! ```

pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod effects;
pub mod enforcement;
pub mod interpreter;

// Re-export commonly used types
pub use checkpoint::Checkpoint;
pub use config::RuntimeConfig;
pub use core::{Event, Node, StateHistory, StateTransition, StateValue};
pub use effects::{Machine, Options};
pub use enforcement::{Mode, Violation};
pub use interpreter::{Interpreter, InterpreterError, StateSnapshot, Status};
