//! Reactor errors
//!
//! Configuration-time failures (tables full, bad timer ids) and handler
//! faults. Interrupt-context failures never show up here: a full queue
//! drops the event and bumps its drop counter instead.
//!
//! Author: Moroya Sakamoto

use core::fmt;

use crate::timed::TimerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Registration table is full (`MAX_SOURCES`)
    TooManySources,
    /// Timer arena is full (`MAX_TIMERS`)
    TooManyTimers,
    /// Id was not handed out by this timer list
    UnknownTimer(TimerId),
    /// A handler touched a timer but no timer list is registered
    NoTimerSource,
    /// Registration from a context with no scheduler behind it
    NoScheduler,
    /// Application handler could not complete; ends `Scheduler::run`
    Fault(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TooManySources => write!(f, "source table full"),
            Error::TooManyTimers => write!(f, "timer table full"),
            Error::UnknownTimer(id) => write!(f, "unknown timer {}", id),
            Error::NoTimerSource => write!(f, "no timer list registered"),
            Error::NoScheduler => write!(f, "context is detached"),
            Error::Fault(what) => write!(f, "handler fault: {}", what),
        }
    }
}

impl core::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;
