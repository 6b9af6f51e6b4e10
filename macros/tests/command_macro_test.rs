//! Tests for `#[derive(Command)]`

use automata_core::Command;
use automata_macros::Command;

#[derive(Clone, Debug, PartialEq)]
enum DoorEvent {
    Open,
    Close,
    Knock(u8),
    Deliver { parcel: String, signed: bool },
}

#[derive(Clone, Debug, Command)]
#[command(event = DoorEvent)]
enum DoorCommand {
    Open,
    #[command(rename = Close)]
    Slam,
    Knock(u8),
    Deliver { parcel: String, signed: bool },
}

#[test]
fn test_unit_variants_map_by_name() {
    assert_eq!(DoorCommand::Open.interpret(), DoorEvent::Open);
}

#[test]
fn test_renamed_variant() {
    assert_eq!(DoorCommand::Slam.interpret(), DoorEvent::Close);
}

#[test]
fn test_tuple_fields_move_across() {
    assert_eq!(DoorCommand::Knock(3).interpret(), DoorEvent::Knock(3));
}

#[test]
fn test_named_fields_move_across() {
    let command = DoorCommand::Deliver {
        parcel: "books".to_string(),
        signed: true,
    };

    assert_eq!(
        command.interpret(),
        DoorEvent::Deliver {
            parcel: "books".to_string(),
            signed: true,
        }
    );
}

#[derive(Clone, Debug, PartialEq, Command)]
#[command(event = Self)]
enum Tick {
    Second,
    Minute(u32),
}

#[test]
fn test_identity_interpretation() {
    assert_eq!(Tick::Second.interpret(), Tick::Second);
    assert_eq!(Tick::Minute(2).interpret(), Tick::Minute(2));
}

#[derive(Clone, Debug, PartialEq, Command)]
#[command(event = Self)]
struct Heartbeat {
    sequence: u64,
}

#[test]
fn test_identity_on_structs() {
    assert_eq!(Heartbeat { sequence: 9 }.interpret(), Heartbeat { sequence: 9 });
}

mod events {
    #[derive(Clone, Debug, PartialEq)]
    pub enum Remote<T> {
        Set(T),
        Nudge { by: T },
        Clear,
    }
}

#[derive(Clone, Debug, Command)]
#[command(event = events::Remote<T>)]
enum Knob<T: Send + 'static> {
    Set(T),
    Nudge { by: T },
    #[command(rename = Clear)]
    Zero,
}

#[test]
fn test_generic_commands_and_qualified_event_paths() {
    assert_eq!(Knob::Set(0.5_f32).interpret(), events::Remote::Set(0.5));
    assert_eq!(Knob::Nudge { by: -2_i8 }.interpret(), events::Remote::Nudge { by: -2 });
    assert_eq!(Knob::<u8>::Zero.interpret(), events::Remote::Clear);
}

#[test]
fn test_interpretation_is_deterministic() {
    use proptest::prelude::*;

    proptest!(|(n in any::<u8>())| {
        prop_assert_eq!(DoorCommand::Knock(n).interpret(), DoorCommand::Knock(n).interpret());
    });
}
