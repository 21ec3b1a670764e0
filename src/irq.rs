//! Keyboard interrupt subscription lifecycle.

use crate::constants::irq;
use crate::platform::{HookId, IrqControl, IrqPolicy};
use crate::KbdError;

/// Mask bit identifying the keyboard line inside a kernel notify bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptMask(u32);

impl InterruptMask {
    fn for_hook(hook: HookId) -> Self {
        Self(1 << hook.0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// True when a notification bitmask includes the keyboard line.
    pub fn matches(self, notify_bits: u32) -> bool {
        notify_bits & self.0 != 0
    }
}

/// Owns the keyboard line's registration with the host kernel. Exactly one
/// subscription may be live at a time; a second `subscribe` is rejected
/// rather than silently re-enabling the line.
pub struct KeyboardIrq<K: IrqControl> {
    kernel: K,
    hook: Option<HookId>,
}

impl<K: IrqControl> KeyboardIrq<K> {
    pub fn new(kernel: K) -> Self {
        Self { kernel, hook: None }
    }

    pub fn is_subscribed(&self) -> bool {
        self.hook.is_some()
    }

    /// Registers the keyboard line (re-enabling, exclusive delivery) and
    /// enables its interrupts. On success the returned mask identifies this
    /// line's notifications among other devices'.
    pub fn subscribe(&mut self) -> Result<InterruptMask, KbdError> {
        if self.hook.is_some() {
            return Err(KbdError::AlreadySubscribed);
        }

        let hook = self
            .kernel
            .set_policy(irq::KEYBOARD_LINE, IrqPolicy::REENABLE | IrqPolicy::EXCLUSIVE)?;
        self.kernel.enable(hook)?;

        self.hook = Some(hook);
        log::debug!("keyboard interrupts subscribed on line {}", irq::KEYBOARD_LINE);
        Ok(InterruptMask::for_hook(hook))
    }

    /// Disables the line, then removes the policy registration. The
    /// subscription stays live if either step fails, so `unsubscribe` can
    /// be retried.
    pub fn unsubscribe(&mut self) -> Result<(), KbdError> {
        let hook = self.hook.ok_or(KbdError::NotSubscribed)?;

        self.kernel.disable(hook)?;
        self.kernel.remove_policy(hook)?;

        self.hook = None;
        log::debug!("keyboard interrupts unsubscribed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::KernelError;

    /// Records the order of kernel calls and fails whichever step the test
    /// arms.
    #[derive(Default)]
    struct FakeKernel {
        calls: [&'static str; 8],
        call_count: usize,
        policy_seen: Option<(u8, IrqPolicy)>,
        fail_enable: bool,
        fail_disable: bool,
    }

    impl FakeKernel {
        fn record(&mut self, call: &'static str) {
            self.calls[self.call_count] = call;
            self.call_count += 1;
        }

        fn calls(&self) -> &[&'static str] {
            &self.calls[..self.call_count]
        }
    }

    impl IrqControl for FakeKernel {
        fn set_policy(&mut self, line: u8, policy: IrqPolicy) -> Result<HookId, KernelError> {
            self.record("set_policy");
            self.policy_seen = Some((line, policy));
            Ok(HookId(line))
        }

        fn enable(&mut self, _hook: HookId) -> Result<(), KernelError> {
            self.record("enable");
            if self.fail_enable {
                return Err(KernelError { code: -1 });
            }
            Ok(())
        }

        fn disable(&mut self, _hook: HookId) -> Result<(), KernelError> {
            self.record("disable");
            if self.fail_disable {
                return Err(KernelError { code: -1 });
            }
            Ok(())
        }

        fn remove_policy(&mut self, _hook: HookId) -> Result<(), KernelError> {
            self.record("remove_policy");
            Ok(())
        }
    }

    #[test]
    fn subscribe_registers_then_enables_the_keyboard_line() {
        let mut irq = KeyboardIrq::new(FakeKernel::default());
        let mask = irq.subscribe().unwrap();

        assert_eq!(irq.kernel.calls(), ["set_policy", "enable"]);
        assert_eq!(
            irq.kernel.policy_seen,
            Some((1, IrqPolicy::REENABLE | IrqPolicy::EXCLUSIVE))
        );
        assert!(irq.is_subscribed());
        assert_eq!(mask.bits(), 1 << 1);
    }

    #[test]
    fn the_mask_singles_out_keyboard_notifications() {
        let mut irq = KeyboardIrq::new(FakeKernel::default());
        let mask = irq.subscribe().unwrap();

        assert!(mask.matches(0b0000_0010));
        assert!(mask.matches(0b1010_0010));
        assert!(!mask.matches(0b0000_0001));
        assert!(!mask.matches(0));
    }

    #[test]
    fn double_subscribe_is_rejected() {
        let mut irq = KeyboardIrq::new(FakeKernel::default());
        irq.subscribe().unwrap();

        assert_eq!(irq.subscribe().unwrap_err(), KbdError::AlreadySubscribed);
        // No second trip to the kernel: the line is not double-enabled.
        assert_eq!(irq.kernel.calls(), ["set_policy", "enable"]);
    }

    #[test]
    fn unsubscribe_disables_before_removing_the_policy() {
        let mut irq = KeyboardIrq::new(FakeKernel::default());
        irq.subscribe().unwrap();
        irq.unsubscribe().unwrap();

        assert_eq!(
            irq.kernel.calls(),
            ["set_policy", "enable", "disable", "remove_policy"]
        );
        assert!(!irq.is_subscribed());
    }

    #[test]
    fn unsubscribe_without_a_subscription_is_rejected() {
        let mut irq = KeyboardIrq::new(FakeKernel::default());
        assert_eq!(irq.unsubscribe().unwrap_err(), KbdError::NotSubscribed);
    }

    #[test]
    fn failed_enable_leaves_the_manager_unsubscribed() {
        let mut irq = KeyboardIrq::new(FakeKernel {
            fail_enable: true,
            ..FakeKernel::default()
        });

        assert!(matches!(irq.subscribe(), Err(KbdError::Kernel(_))));
        assert!(!irq.is_subscribed());
    }

    #[test]
    fn failed_disable_keeps_the_subscription_for_retry() {
        let mut irq = KeyboardIrq::new(FakeKernel {
            fail_disable: true,
            ..FakeKernel::default()
        });
        irq.subscribe().unwrap();

        assert!(matches!(irq.unsubscribe(), Err(KbdError::Kernel(_))));
        assert!(irq.is_subscribed());

        irq.kernel.fail_disable = false;
        irq.unsubscribe().unwrap();
        assert!(!irq.is_subscribed());
    }

    #[test]
    fn resubscribe_after_unsubscribe_works() {
        let mut irq = KeyboardIrq::new(FakeKernel::default());
        irq.subscribe().unwrap();
        irq.unsubscribe().unwrap();
        let mask = irq.subscribe().unwrap();
        assert_eq!(mask.bits(), 1 << 1);
    }
}
