//! The PIN entry machine
//!
//! Digits accumulate until the PIN is as long as the configured length. The
//! request pipeline then asks for validation, and the middleware answers it
//! through the [`PinValidation`] provider.

use crate::session::Route;
use automata_core::{ActionProjector, EffectError, Middleware, Request, StateMachine};
use automata_macros::Command;
use automata_runtime::retry::{self, RetryPolicy};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Digits in a PIN unless configured otherwise
pub const DEFAULT_PIN_LENGTH: usize = 4;

/// Lock screen state
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockState {
    /// Nothing typed yet
    Initial {
        /// Digits the PIN needs
        pin_length: usize,
    },
    /// Digits typed so far
    Pin(Vec<u8>),
    /// The full PIN was rejected
    Invalid,
    /// The full PIN was accepted
    Valid,
}

/// Everything that can happen on the lock screen
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockEvent {
    /// A digit was typed
    Digit(u8),
    /// A complete PIN is waiting for validation
    Validating(Vec<u8>),
    /// The last digit was cleared
    Back,
    /// Start over with an empty PIN
    Reset,
    /// The validator accepted the PIN
    PinValid,
    /// The validator rejected the PIN
    PinInvalid,
}

/// Input from the lock screen's keypad
#[derive(Clone, Debug, PartialEq, Eq, Command)]
#[command(event = LockEvent)]
pub enum LockCommand {
    /// A digit key was tapped
    Digit(u8),
    /// The delete key was tapped
    #[command(rename = Back)]
    ClearLastDigit,
    /// The wrong-PIN shake animation finished
    #[command(rename = Reset)]
    FinishedShake,
}

/// PIN entry transitions
#[derive(Debug, Clone, Copy)]
pub struct PinLock {
    pin_length: usize,
}

impl PinLock {
    /// A lock expecting `pin_length` digits
    #[must_use]
    pub const fn new(pin_length: usize) -> Self {
        Self { pin_length }
    }

    /// Digits the PIN needs
    #[must_use]
    pub const fn pin_length(&self) -> usize {
        self.pin_length
    }
}

impl Default for PinLock {
    fn default() -> Self {
        Self::new(DEFAULT_PIN_LENGTH)
    }
}

impl StateMachine for PinLock {
    type State = LockState;
    type Event = LockEvent;

    fn initial_state(&self) -> LockState {
        LockState::Initial {
            pin_length: self.pin_length,
        }
    }

    fn reduce(&self, state: LockState, event: LockEvent) -> LockState {
        match (state, event) {
            (LockState::Initial { .. }, LockEvent::Digit(digit)) => LockState::Pin(vec![digit]),
            (LockState::Pin(mut digits), LockEvent::Digit(digit)) => {
                digits.push(digit);
                LockState::Pin(digits)
            },
            (LockState::Pin(mut digits), LockEvent::Back) => {
                digits.pop();
                LockState::Pin(digits)
            },
            (LockState::Pin(_), LockEvent::PinValid) => LockState::Valid,
            (LockState::Pin(_), LockEvent::PinInvalid) => LockState::Invalid,
            (_, LockEvent::Reset) => LockState::Pin(Vec::new()),
            (state, _) => state,
        }
    }
}

/// Checks a complete PIN
///
/// Returns `Ok(false)` for a wrong PIN; `Err` only when the check itself
/// could not run.
pub trait PinValidation: Send + Sync {
    /// Validate a complete PIN
    fn validate(&self, pin: Vec<u8>) -> Pin<Box<dyn Future<Output = Result<bool, EffectError>> + Send + '_>>;
}

/// Compares against a fixed secret held in memory
#[derive(Debug, Clone)]
pub struct SecretPinValidator {
    secret: Vec<u8>,
}

impl SecretPinValidator {
    /// Validator accepting exactly `secret`
    #[must_use]
    pub const fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }
}

impl Default for SecretPinValidator {
    fn default() -> Self {
        Self::new(vec![1, 2, 3, 4])
    }
}

impl PinValidation for SecretPinValidator {
    fn validate(&self, pin: Vec<u8>) -> Pin<Box<dyn Future<Output = Result<bool, EffectError>> + Send + '_>> {
        Box::pin(async move { Ok(pin == self.secret) })
    }
}

/// Answers `Validating` with `PinValid` or `PinInvalid`
///
/// Transient validator failures are retried under `policy`. A validator that
/// still cannot answer counts as a wrong PIN, so the screen never hangs.
#[must_use]
pub fn validation_middleware(validator: Arc<dyn PinValidation>, policy: RetryPolicy) -> Middleware<LockEvent> {
    Middleware::when(|event: &LockEvent| match event {
        LockEvent::Validating(pin) => Some(pin.clone()),
        _ => None,
    })
    .then_async(move |pin| {
        let validator = Arc::clone(&validator);
        let policy = policy.clone();
        async move {
            let verdict = retry::retry(&policy, || validator.validate(pin.clone())).await;
            match verdict {
                Ok(true) => Some(LockEvent::PinValid),
                Ok(false) => Some(LockEvent::PinInvalid),
                Err(error) => {
                    tracing::warn!(error = %error, "PIN validator unavailable, rejecting PIN");
                    Some(LockEvent::PinInvalid)
                },
            }
        }
    })
}

/// Asks for validation once `pin_length` digits have been typed
#[must_use]
pub fn validation_request(pin_length: usize) -> Request<LockState, LockEvent> {
    Request::when(move |state: &LockState| match state {
        LockState::Pin(digits) if digits.len() == pin_length => Some(digits.clone()),
        _ => None,
    })
    .then_map(LockEvent::Validating)
}

/// What the keypad screen renders
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayModel {
    /// Filled dots
    pub current_pin_length: usize,
    /// Whether to show the wrong-PIN shake
    pub is_wrong_pin: bool,
}

/// Projects lock states to [`DisplayModel`]s; nothing once unlocked
#[derive(Debug, Clone, Copy)]
pub struct DisplayProjector {
    pin_length: usize,
}

impl DisplayProjector {
    /// Projector for PINs of `pin_length` digits
    #[must_use]
    pub const fn new(pin_length: usize) -> Self {
        Self { pin_length }
    }
}

impl ActionProjector<LockState> for DisplayProjector {
    type Action = DisplayModel;

    fn transform(&self, state: &LockState) -> Option<DisplayModel> {
        match state {
            LockState::Initial { .. } => Some(DisplayModel {
                current_pin_length: 0,
                is_wrong_pin: false,
            }),
            LockState::Pin(digits) => Some(DisplayModel {
                current_pin_length: digits.len(),
                is_wrong_pin: false,
            }),
            LockState::Invalid => Some(DisplayModel {
                current_pin_length: self.pin_length,
                is_wrong_pin: true,
            }),
            LockState::Valid => None,
        }
    }
}

/// Navigates back to the main UI once the PIN is accepted
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlockRouteProjector;

impl ActionProjector<LockState> for UnlockRouteProjector {
    type Action = Route;

    fn transform(&self, state: &LockState) -> Option<Route> {
        matches!(state, LockState::Valid).then_some(Route::MainUi { from_lock: true })
    }
}
