//! # Lock Example
//!
//! The PIN lock screen and the app session, both driven by the automata engine.
//!
//! This example showcases:
//! - A pure machine with identity on unknown transitions (`PinLock`)
//! - A request that fires when the state says so (full-length PIN → validate)
//! - Middleware calling an effect provider (`PinValidation`) with retries
//! - Two projectors over one state stream (display model and navigation)
//! - Explicit provider wiring that fails fast when a provider is missing
//!
//! ## Flow
//!
//! ```text
//! tapped(d) ─► Digit(d) ─► reduce ─► Pin([..d]) ─► request: len == pin_length?
//!                                                       │
//!           PinValid / PinInvalid ◄─ middleware ◄─ Validating(pin)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use lock::{LockEnvironment, LockScreen, Route, SecretPinValidator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let environment = LockEnvironment::builder()
//!     .validator(SecretPinValidator::new(vec![1, 2, 3, 4]))
//!     .build()?;
//! let screen = LockScreen::new(&environment)?;
//! let mut route = screen.route();
//!
//! for digit in [1, 2, 3, 4] {
//!     screen.tapped(digit)?;
//! }
//! assert_eq!(route.next().await, Some(Route::MainUi { from_lock: true }));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod pin;
pub mod screen;
pub mod session;

pub use config::{ConfigError, LockConfig, LockEnvironment};
pub use pin::{
    DisplayModel, DisplayProjector, LockCommand, LockEvent, LockState, PinLock, PinValidation, SecretPinValidator,
    UnlockRouteProjector,
};
pub use screen::{LockEngine, LockScreen};
pub use session::{Route, SessionEngine, SessionEvent, SessionMachine, SessionState};
