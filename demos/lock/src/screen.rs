//! The lock screen's view model.

use crate::config::{ConfigError, LockEnvironment};
use crate::pin::{
    DisplayModel, DisplayProjector, LockCommand, LockState, PinLock, UnlockRouteProjector, validation_middleware,
    validation_request,
};
use crate::session::Route;
use automata_core::{ActionProjector, IdentityProjector};
use automata_runtime::{Engine, EngineConfig, EngineError};
use futures::future;
use futures::stream::{Stream, StreamExt};

/// Engine driving the lock screen; observers see raw states
pub type LockEngine = Engine<PinLock, IdentityProjector, LockCommand>;

/// Keypad input in, display models and navigation out
#[derive(Debug)]
pub struct LockScreen {
    engine: LockEngine,
    pin_length: usize,
}

impl LockScreen {
    /// Wire the lock screen with the default engine configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Engine`] when the engine cannot start.
    pub fn new(environment: &LockEnvironment) -> Result<Self, ConfigError> {
        Self::with_config(environment, EngineConfig::default())
    }

    /// Wire the lock screen with an explicit engine configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Engine`] when the engine cannot start.
    pub fn with_config(environment: &LockEnvironment, config: EngineConfig) -> Result<Self, ConfigError> {
        let pin_length = environment.pin_length;
        let engine = LockEngine::builder(PinLock::new(pin_length), IdentityProjector)
            .middleware(validation_middleware(
                environment.validator.clone(),
                environment.retry.clone(),
            ))
            .request(validation_request(pin_length))
            .config(config.with_name("lock"))
            .build()?;

        Ok(Self { engine, pin_length })
    }

    /// Digits the PIN needs
    #[must_use]
    pub const fn pin_length(&self) -> usize {
        self.pin_length
    }

    /// A digit key was tapped
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Stopped`] once the screen is torn down.
    pub fn tapped(&self, digit: u8) -> Result<(), EngineError> {
        self.engine.handle(LockCommand::Digit(digit))
    }

    /// The delete key was tapped
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Stopped`] once the screen is torn down.
    pub fn tapped_clear_last_digit(&self) -> Result<(), EngineError> {
        self.engine.handle(LockCommand::ClearLastDigit)
    }

    /// The wrong-PIN animation finished
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Stopped`] once the screen is torn down.
    pub fn finished_shake(&self) -> Result<(), EngineError> {
        self.engine.handle(LockCommand::FinishedShake)
    }

    /// What to render, starting with the current screen
    pub fn display_model(&self) -> impl Stream<Item = DisplayModel> + Send + Unpin + use<> {
        project(&self.engine, DisplayProjector::new(self.pin_length))
    }

    /// Where to navigate; emits once the PIN is accepted
    ///
    /// Routes travel on the engine's bounded action channel. An observer that
    /// falls more than `action_capacity` actions behind skips what it missed,
    /// which can include the route; poll this stream promptly.
    pub fn route(&self) -> impl Stream<Item = Route> + Send + Unpin + use<> {
        project(&self.engine, UnlockRouteProjector)
    }

    /// Latest lock state
    #[must_use]
    pub fn state(&self) -> LockState {
        self.engine.state(Clone::clone)
    }

    /// The underlying engine
    #[must_use]
    pub const fn engine(&self) -> &LockEngine {
        &self.engine
    }
}

fn project<P>(engine: &LockEngine, projector: P) -> impl Stream<Item = P::Action> + Send + Unpin + use<P>
where
    P: ActionProjector<LockState>,
{
    engine
        .subscribe()
        .filter_map(move |state| future::ready(projector.transform(&state)))
}
