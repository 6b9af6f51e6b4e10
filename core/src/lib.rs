//! # Automata Core
//!
//! Core traits and combinators for reactive state machines.
//!
//! A feature is modelled as a pure state machine plus two effectful
//! pipelines that surround it. This crate holds the vocabulary; the
//! `automata-runtime` crate wires it into a running engine.
//!
//! ## Core Concepts
//!
//! - **State**: Immutable snapshot of a feature, compared structurally
//! - **Event**: Everything that can happen to the machine
//! - **Command**: External input, interpreted 1:1 into an event
//! - **Machine**: Pure, total `(State, Event) → State`
//! - **Middleware**: `Event → stream<Event>`, runs before reduction
//! - **Request**: `State → stream<Event>`, runs after every publication
//! - **Projector**: `State → Option<Action>`, what observers receive
//!
//! ## Data Flow
//!
//! ```text
//! command ─interpret─▶ event ─middleware─▶ event* ─reduce─▶ state ─project─▶ action
//!                        ▲                                    │
//!                        └──────────────── request ◀──────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use automata_core::{FnMachine, Middleware, Request, StateMachine};
//!
//! // Counter that asks for a reset whenever it reaches 3
//! let machine = FnMachine::new(0_u32, |count: u32, delta: i32| {
//!     if delta < 0 { 0 } else { count + delta.unsigned_abs() }
//! });
//! let request = Request::when(|count: &u32| (*count >= 3).then_some(()))
//!     .then_map(|()| -1_i32);
//! let middleware = Middleware::<i32>::passthrough();
//!
//! assert_eq!(machine.reduce(machine.initial_state(), 2), 2);
//! # let _ = (request, middleware);
//! ```

pub mod command;
pub mod effect;
pub mod machine;
pub mod middleware;
pub mod projector;
pub mod request;

pub use command::Command;
pub use effect::{EffectError, EventStream};
pub use machine::{FnMachine, StateMachine};
pub use middleware::Middleware;
pub use projector::{ActionProjector, FnProjector, IdentityProjector};
pub use request::Request;
