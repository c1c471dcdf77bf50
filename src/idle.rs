//! Idle hook — what the main loop does when a cycle found no work
//!
//! Suspension only ever happens here, at the top of a dispatch cycle.
//! On Cortex-M and RISC-V the default sleeps with WFI until the next
//! interrupt (usually the millisecond tick or an input edge).
//!
//! Author: Moroya Sakamoto

/// Low-power wait between empty cycles
pub trait Idle {
    fn idle(&mut self);
}

/// Sleep until the next interrupt
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitForInterrupt;

impl Idle for WaitForInterrupt {
    #[inline]
    fn idle(&mut self) {
        wait_for_interrupt();
    }
}

/// Busy-poll: never sleep
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdle;

impl Idle for NoIdle {
    #[inline]
    fn idle(&mut self) {
        core::hint::spin_loop();
    }
}

/// Any closure works as an idle hook (tests advance a clock here)
impl<F: FnMut()> Idle for F {
    fn idle(&mut self) {
        self()
    }
}

/// Halt the core until an interrupt is pending
///
/// An event pushed between the last readiness check and WFI is picked up
/// after the next interrupt, at worst one tick late.
#[inline]
pub fn wait_for_interrupt() {
    #[cfg(any(
        all(feature = "cortex-m", target_arch = "arm"),
        all(feature = "riscv", any(target_arch = "riscv32", target_arch = "riscv64"))
    ))]
    unsafe {
        core::arch::asm!("wfi", options(nomem, nostack));
    }

    #[cfg(all(
        feature = "std",
        not(any(
            all(feature = "cortex-m", target_arch = "arm"),
            all(feature = "riscv", any(target_arch = "riscv32", target_arch = "riscv64"))
        ))
    ))]
    {
        std::thread::yield_now();
    }

    #[cfg(not(any(
        feature = "std",
        all(feature = "cortex-m", target_arch = "arm"),
        all(feature = "riscv", any(target_arch = "riscv32", target_arch = "riscv64"))
    )))]
    {
        core::hint::spin_loop();
    }
}
