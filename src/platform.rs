//! Host-kernel collaborator seams.
//!
//! The driver core never touches hardware directly; it goes through the
//! traits here. The bottom half of this module provides the x86_64
//! implementations used when the crate is wired into the kernel proper:
//! raw port I/O, mask-register interrupt control over the legacy PICs, and
//! a busy-wait delay against the diagnostic port.

use bitflags::bitflags;
use thiserror::Error;

use crate::constants::kbc;
use crate::controller::Status;

/// Failure reported by a host kernel primitive. The code mirrors the
/// kernel's negative return convention; this crate never retries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("kernel primitive returned {code}")]
pub struct KernelError {
    pub code: i32,
}

/// Handle the kernel assigns to an interrupt policy registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookId(pub u8);

bitflags! {
    /// Delivery policy requested when registering an interrupt line.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqPolicy: u8 {
        /// Re-enable the line automatically after each delivery.
        const REENABLE = 1 << 0;
        /// Exclusive ownership: no other subscriber may share the line.
        const EXCLUSIVE = 1 << 1;
    }
}

/// Raw port I/O as the host kernel exposes it. Reads are word-sized; the
/// register access layer truncates to the byte the controller produced.
pub trait PortIo {
    fn read(&mut self, port: u16) -> Result<u32, KernelError>;
    fn write(&mut self, port: u16, value: u8) -> Result<(), KernelError>;
}

/// Interrupt line control as the host kernel exposes it.
pub trait IrqControl {
    fn set_policy(&mut self, line: u8, policy: IrqPolicy) -> Result<HookId, KernelError>;
    fn enable(&mut self, hook: HookId) -> Result<(), KernelError>;
    fn disable(&mut self, hook: HookId) -> Result<(), KernelError>;
    fn remove_policy(&mut self, hook: HookId) -> Result<(), KernelError>;
}

/// Physical-delay primitive used for poll backoff.
pub trait Clock {
    fn micros_to_ticks(&self, micros: u64) -> u64;
    fn sleep(&self, ticks: u64);
}

/// Why the low-level handler could not produce a scan code this interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The output buffer was empty at interrupt time.
    #[error("output buffer empty at interrupt time")]
    BufferEmpty,
    /// The controller flagged a parity or timeout fault on the byte.
    #[error("controller flagged a transmission fault")]
    Faulted,
    /// The underlying port read failed.
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

/// The low-level interrupt-time handler: assembles one raw scan-code byte
/// from the hardware interrupt condition.
pub trait ScancodeSource {
    fn capture(&mut self) -> Result<u8, CaptureError>;
}

/// Interrupt-time capture that pulls the byte from the output buffer,
/// gated and validated by the status register.
pub struct IrqScancodes<P: PortIo> {
    ports: P,
}

impl<P: PortIo> IrqScancodes<P> {
    pub fn new(ports: P) -> Self {
        Self { ports }
    }
}

impl<P: PortIo> ScancodeSource for IrqScancodes<P> {
    fn capture(&mut self) -> Result<u8, CaptureError> {
        let status = Status::from_bits_truncate(self.ports.read(kbc::STATUS_REGISTER)? as u8);
        if !status.output_buffer_full() {
            return Err(CaptureError::BufferEmpty);
        }
        let byte = self.ports.read(kbc::OUTPUT_BUFFER)? as u8;
        if status.faulted() {
            return Err(CaptureError::Faulted);
        }
        Ok(byte)
    }
}

// ---------------------------------------------------------------------------
// x86_64 hardware implementations
// ---------------------------------------------------------------------------

#[cfg(target_arch = "x86_64")]
mod hw {
    use pic8259::ChainedPics;
    use spin::Mutex;
    use x86_64::instructions::port::Port;

    use super::{Clock, HookId, IrqControl, IrqPolicy, KernelError, PortIo};
    use crate::constants::irq;

    /// Programmable Interrupt Controller (PIC) pair, remapped past the CPU
    /// exception vectors.
    pub static PICS: Mutex<ChainedPics> =
        Mutex::new(unsafe { ChainedPics::new(irq::PIC_1_OFFSET, irq::PIC_2_OFFSET) });

    /// Port I/O straight through `in`/`out`. Raw x86 port access cannot
    /// report failure; the error path is reserved for hosted kernels that
    /// mediate port access.
    #[derive(Debug, Default)]
    pub struct X86PortIo;

    impl PortIo for X86PortIo {
        fn read(&mut self, port: u16) -> Result<u32, KernelError> {
            let mut port = Port::<u8>::new(port);
            Ok(u32::from(unsafe { port.read() }))
        }

        fn write(&mut self, port: u16, value: u8) -> Result<(), KernelError> {
            let mut port = Port::<u8>::new(port);
            unsafe { port.write(value) };
            Ok(())
        }
    }

    /// Interrupt control over the cascaded PICs. Policy registration is
    /// bookkeeping (the bare PIC has no notion of ownership); enable and
    /// disable toggle the line's bit in the PIC mask register.
    #[derive(Debug, Default)]
    pub struct PicIrqControl;

    impl PicIrqControl {
        pub const fn new() -> Self {
            Self
        }

        /// Remaps both PICs away from the CPU exception vectors. Call once
        /// during kernel startup, before enabling any line.
        ///
        /// # Safety
        ///
        /// Reprograms live interrupt hardware; interrupts for the remapped
        /// vectors must not be enabled yet.
        pub unsafe fn initialize(&mut self) {
            PICS.lock().initialize();
        }

        /// Signals end-of-interrupt for the keyboard vector. Call at the end
        /// of the interrupt handler, after dispatch.
        pub fn end_of_interrupt(&mut self) {
            unsafe {
                PICS.lock()
                    .notify_end_of_interrupt(irq::PIC_1_OFFSET + irq::KEYBOARD_LINE);
            }
        }

        fn mask_port(line: u8) -> Port<u8> {
            if line < 8 {
                Port::new(irq::PIC_1_DATA)
            } else {
                Port::new(irq::PIC_2_DATA)
            }
        }
    }

    impl IrqControl for PicIrqControl {
        fn set_policy(&mut self, line: u8, _policy: IrqPolicy) -> Result<HookId, KernelError> {
            if line >= 16 {
                return Err(KernelError { code: -1 });
            }
            Ok(HookId(line))
        }

        fn enable(&mut self, hook: HookId) -> Result<(), KernelError> {
            let mut port = Self::mask_port(hook.0);
            unsafe {
                let mask = port.read();
                port.write(mask & !(1 << (hook.0 % 8)));
            }
            Ok(())
        }

        fn disable(&mut self, hook: HookId) -> Result<(), KernelError> {
            let mut port = Self::mask_port(hook.0);
            unsafe {
                let mask = port.read();
                port.write(mask | (1 << (hook.0 % 8)));
            }
            Ok(())
        }

        fn remove_policy(&mut self, _hook: HookId) -> Result<(), KernelError> {
            // Nothing to unregister on the bare PIC; masking the line in
            // `disable` already stopped delivery.
            Ok(())
        }
    }

    /// Busy-wait delay against the POST diagnostic port: one write takes on
    /// the order of a microsecond, so ticks are microseconds here.
    #[derive(Debug, Default)]
    pub struct SpinClock;

    impl Clock for SpinClock {
        fn micros_to_ticks(&self, micros: u64) -> u64 {
            micros
        }

        fn sleep(&self, ticks: u64) {
            let mut wait_port = Port::<u8>::new(irq::WAIT_PORT);
            for _ in 0..ticks {
                unsafe { wait_port.write(0) };
            }
        }
    }
}

#[cfg(target_arch = "x86_64")]
pub use hw::{PicIrqControl, SpinClock, X86PortIo, PICS};

/// Controller wired to the real ports and delay, as the kernel uses it.
#[cfg(target_arch = "x86_64")]
pub type HwController = crate::controller::Controller<X86PortIo, SpinClock>;

#[cfg(target_arch = "x86_64")]
impl HwController {
    pub fn hw() -> Self {
        Self::new(X86PortIo, SpinClock)
    }
}
