//! 8042 controller protocol: register access, bounded command writes,
//! command-byte read-back and output-buffer flush.
//!
//! Every write is gated on a fresh status read showing the input buffer
//! clear; every read-back is gated on the output buffer full and the fault
//! bits clear. Status is never cached beyond a single check.

use bitflags::bitflags;

use crate::constants::kbc;
use crate::platform::{Clock, PortIo};
use crate::{Fault, KbdError, WriteStage};

bitflags! {
    /// Status register bits (read from port 0x64).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        /// Output buffer full: a byte is waiting on port 0x60.
        const OUTPUT_BUFFER_FULL = 1 << 0;
        /// Input buffer full: the controller has not consumed the last
        /// host write yet; writing now would clobber it.
        const INPUT_BUFFER_FULL = 1 << 1;
        /// System flag (POST passed).
        const SYSTEM_FLAG = 1 << 2;
        /// Last write to port 0x60 was a command (0) or data (1).
        const COMMAND_DATA = 1 << 3;
        /// Buffered byte came from the mouse port.
        const MOUSE_DATA = 1 << 5;
        /// Transmission timeout.
        const TIMEOUT_ERROR = 1 << 6;
        /// Parity error on the last byte from the device.
        const PARITY_ERROR = 1 << 7;
    }
}

impl Status {
    pub fn input_buffer_full(self) -> bool {
        self.contains(Self::INPUT_BUFFER_FULL)
    }

    pub fn output_buffer_full(self) -> bool {
        self.contains(Self::OUTPUT_BUFFER_FULL)
    }

    pub fn parity_error(self) -> bool {
        self.contains(Self::PARITY_ERROR)
    }

    pub fn timeout_error(self) -> bool {
        self.contains(Self::TIMEOUT_ERROR)
    }

    /// Either fault bit set.
    pub fn faulted(self) -> bool {
        self.intersects(Self::PARITY_ERROR | Self::TIMEOUT_ERROR)
    }
}

bitflags! {
    /// Controller command byte, as returned by
    /// [`Controller::read_command_byte`]. Read-only here: this driver never
    /// writes controller configuration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CommandByte: u8 {
        /// Keyboard (port 1) interrupt enabled.
        const PORT1_INTERRUPT = 1 << 0;
        /// Mouse (port 2) interrupt enabled.
        const PORT2_INTERRUPT = 1 << 1;
        /// System flag (POST passed).
        const SYSTEM_FLAG = 1 << 2;
        /// Keyboard clock disabled.
        const PORT1_CLOCK_DISABLE = 1 << 4;
        /// Mouse clock disabled.
        const PORT2_CLOCK_DISABLE = 1 << 5;
        /// Set 1 translation enabled for the keyboard port.
        const TRANSLATION = 1 << 6;
    }
}

/// Poll-loop policy for one bounded write, decoupled from the I/O calls so
/// the retry behavior is testable without hardware.
pub mod poll {
    use super::Status;

    /// Next action after one status observation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Poll {
        /// Input buffer clear: perform the write now.
        Write,
        /// Input buffer still full: sleep one delay and poll again.
        Wait,
        /// Budget exhausted without ever observing a clear input buffer.
        GiveUp,
    }

    /// Transition function for the bounded write loop. `tries` counts the
    /// full-buffer observations made before this one, so a budget of N
    /// gives up on exactly the Nth consecutive full observation.
    pub fn step(status: Status, tries: u8, budget: u8) -> Poll {
        if !status.input_buffer_full() {
            Poll::Write
        } else if tries + 1 >= budget {
            Poll::GiveUp
        } else {
            Poll::Wait
        }
    }
}

/// Handle on the 8042 controller: owns the port and delay collaborators and
/// the retry budget for bounded writes.
///
/// Bounded writes block for up to one full poll budget of delays, so they
/// belong in setup and reconfiguration paths, never inside the interrupt
/// handler.
pub struct Controller<P: PortIo, C: Clock> {
    ports: P,
    clock: C,
    retry_budget: u8,
}

impl<P: PortIo, C: Clock> Controller<P, C> {
    pub fn new(ports: P, clock: C) -> Self {
        Self {
            ports,
            clock,
            retry_budget: kbc::MAX_WRITE_TRIES,
        }
    }

    /// Same controller with a caller-chosen poll budget (at least one poll).
    pub fn with_retry_budget(mut self, budget: u8) -> Self {
        self.retry_budget = budget.max(1);
        self
    }

    /// Reads the status register. One fresh port read per call.
    pub fn read_status(&mut self) -> Result<Status, KbdError> {
        let word = self.ports.read(kbc::STATUS_REGISTER)?;
        Ok(Status::from_bits_truncate(word as u8))
    }

    /// Reads one byte from the output buffer. Callers must have checked
    /// [`Status::output_buffer_full`] first.
    pub fn read_output_buffer(&mut self) -> Result<u8, KbdError> {
        let word = self.ports.read(kbc::OUTPUT_BUFFER)?;
        Ok(word as u8)
    }

    /// Drains one stale byte from the output buffer if one is pending.
    /// No-op on an empty buffer, so calling it again costs one status read.
    pub fn flush_output_buffer(&mut self) -> Result<(), KbdError> {
        let status = self.read_status()?;
        if status.output_buffer_full() {
            let stale = self.read_output_buffer()?;
            log::debug!("flushed stale byte {stale:#04x} from the output buffer");
        }
        Ok(())
    }

    /// Writes a command byte to the command register under the bounded
    /// poll protocol.
    pub fn write_command(&mut self, cmd: u8) -> Result<(), KbdError> {
        self.bounded_write(kbc::COMMAND_REGISTER, cmd, WriteStage::Command)
    }

    /// Writes a command byte, then its argument byte, each under its own
    /// bounded poll with a fresh retry budget.
    ///
    /// The pair is not atomic: an argument-stage failure leaves the
    /// controller holding a command with no argument. The stage carried in
    /// the error tells the caller which half went through.
    pub fn write_command_with_argument(&mut self, cmd: u8, arg: u8) -> Result<(), KbdError> {
        self.bounded_write(kbc::COMMAND_REGISTER, cmd, WriteStage::Command)?;
        self.bounded_write(kbc::INPUT_BUFFER, arg, WriteStage::Argument)
    }

    /// Asks the controller for its command byte and returns it once status
    /// validation passes: the output buffer must be full, and neither fault
    /// bit may be set for the byte to count.
    pub fn read_command_byte(&mut self) -> Result<CommandByte, KbdError> {
        self.write_command(kbc::CMD_READ_COMMAND_BYTE)?;

        let status = self.read_status()?;
        if !status.output_buffer_full() {
            return Err(KbdError::Validation(Fault::BufferEmpty));
        }

        let byte = self.read_output_buffer()?;
        if status.parity_error() {
            return Err(KbdError::Validation(Fault::Parity));
        }
        if status.timeout_error() {
            return Err(KbdError::Validation(Fault::Timeout));
        }
        Ok(CommandByte::from_bits_truncate(byte))
    }

    fn bounded_write(&mut self, port: u16, value: u8, stage: WriteStage) -> Result<(), KbdError> {
        let mut tries: u8 = 0;
        loop {
            let status = self.read_status()?;
            match poll::step(status, tries, self.retry_budget) {
                poll::Poll::Write => {
                    return self.ports.write(port, value).map_err(KbdError::Kernel);
                }
                poll::Poll::Wait => {
                    tries += 1;
                    let ticks = self.clock.micros_to_ticks(kbc::RETRY_DELAY_MICROS);
                    self.clock.sleep(ticks);
                }
                poll::Poll::GiveUp => {
                    log::warn!(
                        "input buffer still full after {} polls, dropping {stage:?} write",
                        tries + 1
                    );
                    return Err(KbdError::RetryExhausted {
                        stage,
                        tries: tries + 1,
                    });
                }
            }
        }
    }
}
