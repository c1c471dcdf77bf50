//! ALICE-Reactor — cooperative event reactor for microcontrollers
//!
//! Interrupts produce, the main loop consumes.
//!
//! Minimal reactor for bare-metal event handling:
//! - Bounded SPSC event queues with interrupt-safe push (no heap, no locks)
//! - Round-robin dispatch of ready queues from a single main context
//! - Software timers: one-shot, cancellable, ordered by expiry
//! - WFI idle between empty cycles
//!
//! ```text
//! ISR ──push──▶ EventQueue ──ready──▶ Scheduler ──▶ handler(Consumer, Context)
//!                                        │                 │
//!                                        └── due ◀── TimerList ◀── link/unlink
//! ```
//!
//! Author: Moroya Sakamoto

#![no_std]

#[cfg(feature = "std")]
extern crate std;

pub mod clock;
pub mod error;
pub mod gesture;
pub mod idle;
pub mod queue;
pub mod scheduler;
pub mod signal;
pub mod timed;

pub use clock::{Clock, Deadline, ManualClock, Millis, TickCounter};
pub use error::{Error, Result};
pub use gesture::{DoubleClick, Gesture};
pub use idle::{Idle, NoIdle, WaitForInterrupt};
pub use queue::{Consumer, EventQueue, Producer};
pub use scheduler::{Context, Cycle, RunStats, Scheduler, Strategy, MAX_SOURCES};
pub use signal::{bind, Binding, Flow, Handler, Priority, Source};
pub use timed::{TimerFn, TimerId, TimerList, Timers, MAX_TIMERS};
