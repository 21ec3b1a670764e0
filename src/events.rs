//! Scan-code-to-event decoding and the consumer seam.

use crate::constants::scancode;

/// Logical input event raised to the game's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Quit,
}

/// The consumer's state machine, receiving decoded events.
pub trait EventSink {
    fn raise_event(&mut self, event: KeyEvent);
}

/// Make code: the scan code sent on key press.
pub const fn make_code(key: u8) -> u8 {
    key
}

/// Break code: the scan code sent on key release (make code with bit 7 set).
pub const fn break_code(key: u8) -> u8 {
    key | scancode::BREAK_BIT
}

/// One scan code the driver recognizes, bound to the event it raises.
struct Binding {
    code: u8,
    event: KeyEvent,
}

/// Key binding table - add new keys here.
///
/// Movement fires on make codes (key press), so held keys steer the snake
/// immediately; quit fires on the ESC break code (key release), so quitting
/// takes a full press-and-release and a held ESC cannot fire twice.
const BINDINGS: &[Binding] = &[
    Binding {
        code: make_code(scancode::W_KEY),
        event: KeyEvent::MoveUp,
    },
    Binding {
        code: make_code(scancode::S_KEY),
        event: KeyEvent::MoveDown,
    },
    Binding {
        code: make_code(scancode::A_KEY),
        event: KeyEvent::MoveLeft,
    },
    Binding {
        code: make_code(scancode::D_KEY),
        event: KeyEvent::MoveRight,
    },
    Binding {
        code: break_code(scancode::ESC_KEY),
        event: KeyEvent::Quit,
    },
];

/// Maps a raw scan code to the event it is bound to. Unbound codes are
/// ignored, not errors.
pub fn decode(code: u8) -> Option<KeyEvent> {
    BINDINGS.iter().find(|b| b.code == code).map(|b| b.event)
}
