//! Time source — hardware-abstract millisecond counter
//!
//! The reactor only needs a relative, monotonically increasing counter
//! that wraps at `u32::MAX`. On real hardware a periodic timer interrupt
//! calls [`TickCounter::tick`] once per millisecond. For testing,
//! [`ManualClock`] is advanced by hand.
//!
//! All elapsed-time arithmetic is wrapping; compare instants with
//! [`elapsed`] or [`is_reached`], never with `<`.
//!
//! Author: Moroya Sakamoto

use core::cell::Cell;

use critical_section::Mutex;

/// Milliseconds since an arbitrary origin, wrapping
pub type Millis = u32;

/// Longest delay that still orders correctly against a wrapping clock
pub const MAX_DELAY_MS: Millis = i32::MAX as Millis;

/// Milliseconds from `since` to `now`, across a wrap
#[inline]
pub fn elapsed(since: Millis, now: Millis) -> Millis {
    now.wrapping_sub(since)
}

/// Has `now` reached or passed `instant`?
///
/// Valid while the two are less than `MAX_DELAY_MS` apart.
#[inline]
pub fn is_reached(instant: Millis, now: Millis) -> bool {
    now.wrapping_sub(instant) as i32 >= 0
}

/// Millisecond time source
pub trait Clock {
    /// Current time
    fn now_ms(&self) -> Millis;

    /// Busy-wait for `ms` milliseconds
    ///
    /// Requires the counter to be advanced by an interrupt.
    fn delay_ms(&self, ms: Millis) {
        let start = self.now_ms();
        while elapsed(start, self.now_ms()) < ms {
            core::hint::spin_loop();
        }
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> Millis {
        (**self).now_ms()
    }

    fn delay_ms(&self, ms: Millis) {
        (**self).delay_ms(ms)
    }
}

/// Interrupt-driven tick counter
///
/// Place in a `static` and call [`tick`](Self::tick) from the periodic
/// timer interrupt. Guarded by a critical section because the small cores
/// this targets have no atomic add.
pub struct TickCounter {
    ticks: Mutex<Cell<Millis>>,
}

impl TickCounter {
    pub const fn new() -> Self {
        Self {
            ticks: Mutex::new(Cell::new(0)),
        }
    }

    /// Advance by one millisecond (timer ISR)
    #[inline]
    pub fn tick(&self) {
        self.advance(1);
    }

    /// Advance by `ms` (timer ISR running at a coarser period)
    pub fn advance(&self, ms: Millis) {
        critical_section::with(|cs| {
            let ticks = self.ticks.borrow(cs);
            ticks.set(ticks.get().wrapping_add(ms));
        });
    }
}

impl Clock for TickCounter {
    fn now_ms(&self) -> Millis {
        critical_section::with(|cs| self.ticks.borrow(cs).get())
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Software clock for testing and host simulation
pub struct ManualClock {
    now: Cell<Millis>,
}

impl ManualClock {
    pub const fn new(start: Millis) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn advance(&self, ms: Millis) {
        self.now.set(self.now.get().wrapping_add(ms));
    }

    pub fn set(&self, now: Millis) {
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }

    /// Nothing else moves a manual clock, so "waiting" just advances it
    fn delay_ms(&self, ms: Millis) {
        self.advance(ms);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Expiry of a timed event, remembered with its link time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    /// Link time
    start: Millis,
    /// Absolute expiry (wrapping)
    at: Millis,
}

impl Deadline {
    /// Deadline `delay` ms after `now`
    pub fn after(now: Millis, delay: Millis) -> Self {
        Self {
            start: now,
            at: now.wrapping_add(delay),
        }
    }

    /// Absolute expiry
    pub fn at(&self) -> Millis {
        self.at
    }

    pub fn is_expired(&self, now: Millis) -> bool {
        is_reached(self.at, now)
    }

    /// Remaining time until expiry (0 if expired)
    pub fn remaining(&self, now: Millis) -> Millis {
        if self.is_expired(now) {
            0
        } else {
            self.at.wrapping_sub(now)
        }
    }

    /// Elapsed since link time
    pub fn elapsed(&self, now: Millis) -> Millis {
        elapsed(self.start, now)
    }
}
