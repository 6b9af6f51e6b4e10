//! Interpretation of external commands into internal events.
//!
//! Commands are what the outside world says ("the user tapped 3"); events
//! are what the machine reduces. Every command type maps each value to
//! exactly one event. The mapping is pure so the runtime can apply it
//! synchronously, in arrival order, at the intake call.
//!
//! Enums that mirror their event enum variant for variant can derive the
//! mapping with `#[derive(Command)]` from `automata-macros`, including the
//! identity mapping for event types used directly as commands
//! (`#[command(event = Self)]`).

/// A 1:1, deterministic mapping from a command to its event type.
///
/// # Example
///
/// ```
/// use automata_core::command::Command;
///
/// #[derive(Debug, PartialEq)]
/// enum KeypadEvent {
///     Digit(u8),
///     Clear,
/// }
///
/// enum Keypad {
///     Tapped(u8),
///     LongPressed,
/// }
///
/// impl Command for Keypad {
///     type Event = KeypadEvent;
///
///     fn interpret(self) -> KeypadEvent {
///         match self {
///             Self::Tapped(d) => KeypadEvent::Digit(d),
///             Self::LongPressed => KeypadEvent::Clear,
///         }
///     }
/// }
///
/// assert_eq!(Keypad::Tapped(3).interpret(), KeypadEvent::Digit(3));
/// assert_eq!(Keypad::LongPressed.interpret(), KeypadEvent::Clear);
/// ```
pub trait Command: Send + 'static {
    /// The event this command stands for.
    type Event;

    /// Translate the command into the single event it stands for.
    fn interpret(self) -> Self::Event;
}
