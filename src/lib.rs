#![no_std]

//! 8042 keyboard controller driver core for the Nibbles kernel.
//!
//! Owns the controller handshake protocol (bounded busy-wait command writes,
//! validated command-byte read-back, output-buffer flush), the keyboard
//! interrupt subscription lifecycle, and the interrupt-time decoding of raw
//! scan codes into the game events the snake state machine consumes.
//!
//! All protocol logic is written against the host-kernel traits in
//! [`platform`], so the same core runs on real hardware through the bundled
//! x86_64 implementations and under unit tests through mock kernels.

pub mod constants;
pub mod controller;
pub mod dispatch;
pub mod events;
pub mod irq;
pub mod platform;

use thiserror::Error;

pub use controller::{CommandByte, Controller, Status};
pub use dispatch::{handle_interrupt, ScancodeSlot};
pub use events::{decode, EventSink, KeyEvent};
pub use irq::{InterruptMask, KeyboardIrq};
pub use platform::{CaptureError, Clock, IrqControl, KernelError, PortIo, ScancodeSource};

/// Which half of a command-plus-argument sequence a bounded write was
/// performing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    /// The command byte, written to the command register.
    Command,
    /// The argument byte, written to the input buffer after the command went
    /// through. Failing here leaves the controller partially updated, so
    /// callers must treat it as fatal rather than resend the pair.
    Argument,
}

/// Reason a command-byte read-back was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The output buffer never filled; there was nothing to read.
    BufferEmpty,
    /// Parity error flagged alongside the byte.
    Parity,
    /// Transmission timeout flagged alongside the byte.
    Timeout,
}

/// Driver-level failure. Kernel primitive failures pass through untouched;
/// the other variants say which controller guarantee was broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KbdError {
    /// A host kernel primitive (port I/O, interrupt control) failed.
    #[error("kernel call failed: {0}")]
    Kernel(#[from] KernelError),

    /// The input buffer never cleared within the poll budget.
    #[error("input buffer still full after {tries} polls ({stage:?} write)")]
    RetryExhausted { stage: WriteStage, tries: u8 },

    /// A read-back byte was rejected by status validation.
    #[error("command byte read-back rejected: {0:?}")]
    Validation(Fault),

    /// `subscribe` was called while a subscription is already live.
    #[error("keyboard interrupt line already subscribed")]
    AlreadySubscribed,

    /// `unsubscribe` was called with no live subscription.
    #[error("keyboard interrupt line not subscribed")]
    NotSubscribed,
}
