//! Interrupt-time dispatch: capture one scan code, hand it through the
//! single-slot cell, raise at most one event at the consumer.

use spin::Mutex;

use crate::events::{decode, EventSink};
use crate::platform::ScancodeSource;

/// Single-slot handoff cell between the interrupt path (writer) and the
/// dispatch path (reader). A fresh byte overwrites an unread one, matching
/// the controller's own single-byte output buffer.
pub struct ScancodeSlot {
    byte: Mutex<Option<u8>>,
}

impl ScancodeSlot {
    pub const fn new() -> Self {
        Self {
            byte: Mutex::new(None),
        }
    }

    /// Publishes a freshly captured byte, returning the unread byte it
    /// displaced, if any.
    pub fn publish(&self, code: u8) -> Option<u8> {
        self.byte.lock().replace(code)
    }

    /// Takes the pending byte, leaving the slot empty.
    pub fn take(&self) -> Option<u8> {
        self.byte.lock().take()
    }
}

impl Default for ScancodeSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Slot backing the global interrupt entry point.
static SCANCODES: ScancodeSlot = ScancodeSlot::new();

/// Interrupt callback entry point: captures the scan code produced by the
/// low-level handler and forwards at most one decoded event to the
/// consumer. A failed capture aborts the dispatch with no event; input is
/// best-effort, so the failure is logged rather than surfaced.
pub fn handle_interrupt<S, E>(source: &mut S, sink: &mut E)
where
    S: ScancodeSource,
    E: EventSink,
{
    dispatch_through(&SCANCODES, source, sink)
}

fn dispatch_through<S, E>(slot: &ScancodeSlot, source: &mut S, sink: &mut E)
where
    S: ScancodeSource,
    E: EventSink,
{
    let code = match source.capture() {
        Ok(code) => code,
        Err(err) => {
            log::warn!("scan code capture failed, dropping this interrupt: {err}");
            return;
        }
    };

    if let Some(stale) = slot.publish(code) {
        log::warn!("overwrote unread scan code {stale:#04x}");
    }

    let Some(code) = slot.take() else {
        return;
    };

    log::debug!("scan code {code:#04x}");
    if let Some(event) = decode(code) {
        sink.raise_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::KeyEvent;
    use crate::platform::CaptureError;

    /// Yields one scripted capture result per interrupt.
    struct ScriptedSource {
        results: [Result<u8, CaptureError>; 4],
        next: usize,
    }

    impl ScriptedSource {
        fn of(results: &[Result<u8, CaptureError>]) -> Self {
            let mut fixed = [Ok(0); 4];
            fixed[..results.len()].copy_from_slice(results);
            Self {
                results: fixed,
                next: 0,
            }
        }
    }

    impl ScancodeSource for ScriptedSource {
        fn capture(&mut self) -> Result<u8, CaptureError> {
            let result = self.results[self.next];
            self.next += 1;
            result
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: [Option<KeyEvent>; 4],
        count: usize,
    }

    impl EventSink for RecordingSink {
        fn raise_event(&mut self, event: KeyEvent) {
            self.events[self.count] = Some(event);
            self.count += 1;
        }
    }

    #[test]
    fn w_make_code_raises_exactly_one_move_up() {
        let slot = ScancodeSlot::new();
        let mut source = ScriptedSource::of(&[Ok(0x11)]);
        let mut sink = RecordingSink::default();

        dispatch_through(&slot, &mut source, &mut sink);

        assert_eq!(sink.count, 1);
        assert_eq!(sink.events[0], Some(KeyEvent::MoveUp));
    }

    #[test]
    fn escape_break_code_raises_exactly_one_quit() {
        let slot = ScancodeSlot::new();
        let mut source = ScriptedSource::of(&[Ok(0x81)]);
        let mut sink = RecordingSink::default();

        dispatch_through(&slot, &mut source, &mut sink);

        assert_eq!(sink.count, 1);
        assert_eq!(sink.events[0], Some(KeyEvent::Quit));
    }

    #[test]
    fn unbound_codes_raise_nothing() {
        let slot = ScancodeSlot::new();
        let mut source = ScriptedSource::of(&[Ok(0x3B)]);
        let mut sink = RecordingSink::default();

        dispatch_through(&slot, &mut source, &mut sink);

        assert_eq!(sink.count, 0);
    }

    #[test]
    fn failed_captures_are_dropped_silently() {
        let slot = ScancodeSlot::new();
        let mut source = ScriptedSource::of(&[Err(CaptureError::BufferEmpty)]);
        let mut sink = RecordingSink::default();

        dispatch_through(&slot, &mut source, &mut sink);

        assert_eq!(sink.count, 0);
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn one_event_per_interrupt_over_a_session() {
        let slot = ScancodeSlot::new();
        let mut source = ScriptedSource::of(&[
            Ok(0x11),
            Err(CaptureError::Faulted),
            Ok(0x20),
            Ok(0x81),
        ]);
        let mut sink = RecordingSink::default();

        for _ in 0..4 {
            dispatch_through(&slot, &mut source, &mut sink);
        }

        assert_eq!(sink.count, 3);
        assert_eq!(sink.events[0], Some(KeyEvent::MoveUp));
        assert_eq!(sink.events[1], Some(KeyEvent::MoveRight));
        assert_eq!(sink.events[2], Some(KeyEvent::Quit));
    }

    #[test]
    fn the_slot_overwrites_and_empties() {
        let slot = ScancodeSlot::new();
        assert_eq!(slot.publish(0x11), None);
        assert_eq!(slot.publish(0x1F), Some(0x11));
        assert_eq!(slot.take(), Some(0x1F));
        assert_eq!(slot.take(), None);
    }
}
