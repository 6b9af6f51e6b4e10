//! The app session machine
//!
//! Decides whether the main UI or the lock screen is showing. The lock
//! screen reports back through [`SessionEvent::Unlock`].

use automata_core::{ActionProjector, StateMachine};
use automata_macros::Command;
use automata_runtime::{Engine, EngineConfig, EngineError};

/// Where the app navigates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// The wallet; `from_lock` dismisses the lock screen instead of pushing
    MainUi {
        /// Whether the lock screen is being dismissed
        from_lock: bool,
    },
    /// Present the lock screen
    Lock,
}

/// App session state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Launching
    Loading,
    /// The main UI is available
    Unlocked {
        /// Whether it was reached through the lock screen
        from_lock: bool,
    },
    /// The lock screen is required
    Locked,
}

/// Session events, also accepted as commands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Command)]
#[command(event = Self)]
pub enum SessionEvent {
    /// The app finished launching
    Start,
    /// The app went to the background or timed out
    Lock,
    /// The PIN was accepted
    Unlock,
}

/// Session transitions
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionMachine;

impl StateMachine for SessionMachine {
    type State = SessionState;
    type Event = SessionEvent;

    fn initial_state(&self) -> SessionState {
        SessionState::Loading
    }

    fn reduce(&self, state: SessionState, event: SessionEvent) -> SessionState {
        match (state, event) {
            (SessionState::Loading, SessionEvent::Start) => SessionState::Unlocked { from_lock: false },
            (_, SessionEvent::Lock) => SessionState::Locked,
            (_, SessionEvent::Unlock) => SessionState::Unlocked { from_lock: true },
            (state, SessionEvent::Start) => state,
        }
    }
}

/// Projects the session onto navigation
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionRouteProjector;

impl ActionProjector<SessionState> for SessionRouteProjector {
    type Action = Route;

    fn transform(&self, state: &SessionState) -> Option<Route> {
        match state {
            SessionState::Loading => None,
            SessionState::Unlocked { from_lock } => Some(Route::MainUi { from_lock: *from_lock }),
            SessionState::Locked => Some(Route::Lock),
        }
    }
}

/// Engine for the app session
pub type SessionEngine = Engine<SessionMachine, SessionRouteProjector, SessionEvent>;

/// Start the session engine; it has no effects of its own
///
/// # Errors
///
/// Returns [`EngineError`] when called outside a Tokio runtime or with an invalid config.
pub fn session(config: EngineConfig) -> Result<SessionEngine, EngineError> {
    SessionEngine::builder(SessionMachine, SessionRouteProjector)
        .config(config.with_name("session"))
        .build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use automata_testing::MachineTest;
    use automata_testing::helpers::take_within;
    use std::time::Duration;

    #[test]
    fn test_start_only_from_loading() {
        MachineTest::new(SessionMachine)
            .when_events([SessionEvent::Start, SessionEvent::Lock, SessionEvent::Start])
            .then_state_eq(SessionState::Locked)
            .run();
    }

    #[test]
    fn test_unlock_comes_from_the_lock_screen() {
        MachineTest::new(SessionMachine)
            .given_state(SessionState::Locked)
            .when_event(SessionEvent::Unlock)
            .then_projects(SessionRouteProjector, Some(Route::MainUi { from_lock: true }))
            .run();
    }

    #[test]
    fn test_loading_has_no_route() {
        assert_eq!(SessionRouteProjector.transform(&SessionState::Loading), None);
    }

    #[tokio::test]
    async fn test_session_routes() {
        let engine = session(EngineConfig::default()).unwrap();
        let mut routes = engine.subscribe();

        engine.handle(SessionEvent::Start).unwrap();
        engine.handle(SessionEvent::Lock).unwrap();
        engine.handle(SessionEvent::Unlock).unwrap();

        assert_eq!(
            take_within(&mut routes, 3, Duration::from_secs(1)).await,
            vec![
                Route::MainUi { from_lock: false },
                Route::Lock,
                Route::MainUi { from_lock: true },
            ]
        );
    }
}
