//! Property tests for the lock and session machines

use automata_testing::properties::{assert_identity_on_unknown, assert_interpret_deterministic};
use lock::{LockCommand, LockEvent, LockState, PinLock, SessionEvent, SessionMachine, SessionState};
use proptest::prelude::*;

fn lock_states() -> impl Strategy<Value = LockState> {
    prop_oneof![
        (1_usize..8).prop_map(|pin_length| LockState::Initial { pin_length }),
        proptest::collection::vec(0_u8..10, 0..6).prop_map(LockState::Pin),
        Just(LockState::Invalid),
        Just(LockState::Valid),
    ]
}

fn lock_events() -> impl Strategy<Value = LockEvent> {
    prop_oneof![
        (0_u8..10).prop_map(LockEvent::Digit),
        proptest::collection::vec(0_u8..10, 0..6).prop_map(LockEvent::Validating),
        Just(LockEvent::Back),
        Just(LockEvent::Reset),
        Just(LockEvent::PinValid),
        Just(LockEvent::PinInvalid),
    ]
}

fn lock_commands() -> impl Strategy<Value = LockCommand> {
    prop_oneof![
        (0_u8..10).prop_map(LockCommand::Digit),
        Just(LockCommand::ClearLastDigit),
        Just(LockCommand::FinishedShake),
    ]
}

/// Pairs with a transition of their own in the lock's table
fn lock_handles(state: &LockState, event: &LockEvent) -> bool {
    match (state, event) {
        (_, LockEvent::Reset) | (LockState::Initial { .. }, LockEvent::Digit(_)) => true,
        (LockState::Pin(digits), LockEvent::Back) => !digits.is_empty(),
        (LockState::Pin(_), LockEvent::Digit(_) | LockEvent::PinValid | LockEvent::PinInvalid) => true,
        _ => false,
    }
}

#[test]
fn lock_ignores_unknown_transitions() {
    assert_identity_on_unknown(&PinLock::default(), lock_states(), lock_events(), lock_handles);
}

#[test]
fn lock_interpretation_is_deterministic() {
    assert_interpret_deterministic(lock_commands());
}

#[test]
fn session_ignores_unknown_transitions() {
    let states = prop_oneof![
        Just(SessionState::Loading),
        any::<bool>().prop_map(|from_lock| SessionState::Unlocked { from_lock }),
        Just(SessionState::Locked),
    ];
    let events = prop_oneof![
        Just(SessionEvent::Start),
        Just(SessionEvent::Lock),
        Just(SessionEvent::Unlock),
    ];

    assert_identity_on_unknown(&SessionMachine, states, events, |state, event| {
        !matches!(event, SessionEvent::Start) || matches!(state, SessionState::Loading)
    });
}

proptest! {
    #[test]
    fn pin_never_exceeds_typed_digits(digits in proptest::collection::vec(0_u8..10, 0..12), backs in 0_usize..6) {
        use automata_core::StateMachine;

        let machine = PinLock::default();
        let mut state = machine.initial_state();
        for digit in &digits {
            state = machine.reduce(state, LockEvent::Digit(*digit));
        }
        for _ in 0..backs {
            state = machine.reduce(state, LockEvent::Back);
        }

        match state {
            LockState::Pin(typed) => {
                prop_assert_eq!(typed.len(), digits.len().saturating_sub(backs));
                prop_assert_eq!(&typed[..], &digits[..typed.len()]);
            },
            LockState::Initial { .. } => prop_assert!(digits.is_empty()),
            other => prop_assert!(false, "unexpected state {:?}", other),
        }
    }
}
