//! Ergonomic testing utilities for state machines
//!
//! This module provides a fluent API for testing machines with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // MachineTest is the natural name

use automata_core::{ActionProjector, StateMachine};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for history assertion functions
type HistoryAssertion<S> = Box<dyn FnOnce(&[S])>;

/// Fluent API for testing machines with Given-When-Then syntax
///
/// Events are folded in order through [`StateMachine::reduce`]; assertions
/// run against the final state and, optionally, the state after each event.
///
/// # Example
///
/// ```
/// use automata_core::FnMachine;
/// use automata_testing::MachineTest;
///
/// let counter = FnMachine::new(0_i32, |count: i32, delta: i32| count + delta);
///
/// MachineTest::new(counter)
///     .given_state(10)
///     .when_event(5)
///     .when_event(-3)
///     .then_state(|count| assert_eq!(*count, 12))
///     .then_history(|states| assert_eq!(states, [15, 12]))
///     .run();
/// ```
pub struct MachineTest<M>
where
    M: StateMachine,
{
    machine: M,
    initial_state: Option<M::State>,
    events: Vec<M::Event>,
    state_assertions: Vec<StateAssertion<M::State>>,
    history_assertions: Vec<HistoryAssertion<M::State>>,
}

impl<M> MachineTest<M>
where
    M: StateMachine,
{
    /// Create a new test for the given machine
    #[must_use]
    pub const fn new(machine: M) -> Self {
        Self {
            machine,
            initial_state: None,
            events: Vec::new(),
            state_assertions: Vec::new(),
            history_assertions: Vec::new(),
        }
    }

    /// Set the starting state (Given); defaults to the machine's initial state
    #[must_use]
    pub fn given_state(mut self, state: M::State) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Append an event to reduce (When)
    #[must_use]
    pub fn when_event(mut self, event: M::Event) -> Self {
        self.events.push(event);
        self
    }

    /// Append several events to reduce, in order (When)
    #[must_use]
    pub fn when_events<I>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = M::Event>,
    {
        self.events.extend(events);
        self
    }

    /// Add an assertion about the final state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&M::State) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Assert the final state equals `expected` (Then)
    #[must_use]
    pub fn then_state_eq(self, expected: M::State) -> Self {
        self.then_state(move |state| assert_eq!(*state, expected, "unexpected final state"))
    }

    /// Assert the final state projects to `expected` (Then)
    #[must_use]
    pub fn then_projects<P>(self, projector: P, expected: Option<P::Action>) -> Self
    where
        P: ActionProjector<M::State>,
        P::Action: PartialEq,
    {
        self.then_state(move |state| {
            assert_eq!(
                projector.transform(state),
                expected,
                "unexpected projection of {state:?}"
            );
        })
    }

    /// Add an assertion about the state after each event (Then)
    #[must_use]
    pub fn then_history<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[M::State]) + 'static,
    {
        self.history_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if any assertion fails.
    pub fn run(self) {
        let Self {
            machine,
            initial_state,
            events,
            state_assertions,
            history_assertions,
        } = self;

        let mut state = initial_state.unwrap_or_else(|| machine.initial_state());
        let mut history = Vec::with_capacity(events.len());

        for event in events {
            state = machine.reduce(state, event);
            history.push(state.clone());
        }

        for assertion in state_assertions {
            assertion(&state);
        }

        for assertion in history_assertions {
            assertion(&history);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automata_core::FnProjector;

    #[derive(Clone, Debug, PartialEq)]
    enum Gauge {
        Empty,
        Level(u8),
    }

    #[derive(Clone, Debug)]
    enum GaugeEvent {
        Fill(u8),
        Drain,
    }

    struct GaugeMachine;

    impl StateMachine for GaugeMachine {
        type State = Gauge;
        type Event = GaugeEvent;

        fn initial_state(&self) -> Gauge {
            Gauge::Empty
        }

        fn reduce(&self, state: Gauge, event: GaugeEvent) -> Gauge {
            match (state, event) {
                (Gauge::Empty, GaugeEvent::Fill(n)) => Gauge::Level(n),
                (Gauge::Level(level), GaugeEvent::Fill(n)) => Gauge::Level(level.saturating_add(n)),
                (Gauge::Level(_), GaugeEvent::Drain) => Gauge::Empty,
                (state, _) => state,
            }
        }
    }

    #[test]
    fn test_defaults_to_initial_state() {
        MachineTest::new(GaugeMachine)
            .when_event(GaugeEvent::Fill(3))
            .then_state_eq(Gauge::Level(3))
            .run();
    }

    #[test]
    fn test_history_records_each_step() {
        MachineTest::new(GaugeMachine)
            .given_state(Gauge::Level(1))
            .when_events([GaugeEvent::Fill(2), GaugeEvent::Drain, GaugeEvent::Drain])
            .then_history(|states| {
                assert_eq!(states, [Gauge::Level(3), Gauge::Empty, Gauge::Empty]);
            })
            .run();
    }

    #[test]
    fn test_then_projects() {
        let level = FnProjector::new(|gauge: &Gauge| match gauge {
            Gauge::Level(n) => Some(*n),
            Gauge::Empty => None,
        });

        MachineTest::new(GaugeMachine)
            .when_event(GaugeEvent::Drain)
            .then_projects(level, None)
            .run();
    }

    #[test]
    #[should_panic(expected = "unexpected final state")]
    fn test_failed_assertion_panics() {
        MachineTest::new(GaugeMachine)
            .when_event(GaugeEvent::Fill(1))
            .then_state_eq(Gauge::Empty)
            .run();
    }
}
