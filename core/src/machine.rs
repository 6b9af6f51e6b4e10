//! The pure transition function at the heart of every engine.
//!
//! A [`StateMachine`] owns no data and performs no I/O. It names the state
//! and event types, provides the distinguished initial state, and folds one
//! event into a state. The runtime is the only caller of [`StateMachine::reduce`]
//! and it serializes every call, so implementations never need interior
//! mutability.
//!
//! # Example
//!
//! ```
//! use automata_core::machine::StateMachine;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum Door {
//!     Closed,
//!     Open,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum DoorEvent {
//!     Push,
//!     Pull,
//! }
//!
//! struct DoorMachine;
//!
//! impl StateMachine for DoorMachine {
//!     type State = Door;
//!     type Event = DoorEvent;
//!
//!     fn initial_state(&self) -> Door {
//!         Door::Closed
//!     }
//!
//!     fn reduce(&self, state: Door, event: DoorEvent) -> Door {
//!         match (state, event) {
//!             (Door::Closed, DoorEvent::Push) => Door::Open,
//!             (Door::Open, DoorEvent::Pull) => Door::Closed,
//!             (state, _) => state,
//!         }
//!     }
//! }
//!
//! let machine = DoorMachine;
//! let open = machine.reduce(machine.initial_state(), DoorEvent::Push);
//! assert_eq!(open, Door::Open);
//! // Unknown transitions are the identity
//! assert_eq!(machine.reduce(open.clone(), DoorEvent::Push), open);
//! ```

use std::fmt::Debug;

/// A pure, total state transition function.
///
/// # Contract
///
/// - `reduce` never fails and never performs side effects.
/// - Pairs of `(state, event)` the machine does not recognise return the
///   state unchanged.
/// - `State` equality is structural; the runtime relies on it to detect
///   no-op transitions.
pub trait StateMachine: Send + Sync + 'static {
    /// The immutable snapshot type.
    type State: Clone + PartialEq + Debug + Send + Sync + 'static;

    /// Everything that can happen to the machine.
    type Event: Clone + Debug + Send + 'static;

    /// The state every engine starts from.
    fn initial_state(&self) -> Self::State;

    /// Fold one event into a state.
    fn reduce(&self, state: Self::State, event: Self::Event) -> Self::State;
}

/// A [`StateMachine`] assembled from plain function values.
///
/// Useful for small machines and tests where declaring a dedicated type is
/// more ceremony than the machine itself.
///
/// # Example
///
/// ```
/// use automata_core::machine::{FnMachine, StateMachine};
///
/// let counter = FnMachine::new(0_i64, |count: i64, delta: i64| count + delta);
/// assert_eq!(counter.reduce(counter.initial_state(), 5), 5);
/// ```
pub struct FnMachine<S, E> {
    initial: S,
    reduce: Box<dyn Fn(S, E) -> S + Send + Sync>,
}

impl<S, E> FnMachine<S, E> {
    /// Create a machine from an initial state and a reducer function.
    #[must_use]
    pub fn new<F>(initial: S, reduce: F) -> Self
    where
        F: Fn(S, E) -> S + Send + Sync + 'static,
    {
        Self {
            initial,
            reduce: Box::new(reduce),
        }
    }
}

impl<S, E> StateMachine for FnMachine<S, E>
where
    S: Clone + PartialEq + Debug + Send + Sync + 'static,
    E: Clone + Debug + Send + 'static,
{
    type State = S;
    type Event = E;

    fn initial_state(&self) -> S {
        self.initial.clone()
    }

    fn reduce(&self, state: S, event: E) -> S {
        (self.reduce)(state, event)
    }
}

impl<S: Debug, E> Debug for FnMachine<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnMachine")
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}
