//! Press gestures — single vs. double press from one button stream
//!
//! Two-state machine on top of one timed event:
//!
//! ```text
//! Idle  + press   → Armed   (link timeout)
//! Armed + press   → Idle    (unlink timeout, Double)
//! Armed + timeout → Idle    (Single)
//! ```
//!
//! The button handler calls [`DoubleClick::on_press`]; the timeout's
//! callback calls [`DoubleClick::on_timeout`]. Both hand the resulting
//! gesture back so the application can forward it (an LED queue, say).
//!
//! Author: Moroya Sakamoto

use crate::clock::Millis;
use crate::error::Result;
use crate::timed::{TimerId, Timers};

/// Second press must land within this window to count as a double
pub const DEFAULT_TIMEOUT_MS: Millis = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Single,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickState {
    Idle,
    /// One press seen, timeout pending
    Armed,
}

/// Single/double press disambiguator
#[derive(Debug, Clone, Copy)]
pub struct DoubleClick {
    state: ClickState,
    timeout: TimerId,
}

impl DoubleClick {
    /// `timeout` must be a timed event whose callback ends up in
    /// [`on_timeout`](Self::on_timeout)
    pub const fn new(timeout: TimerId) -> Self {
        Self {
            state: ClickState::Idle,
            timeout,
        }
    }

    pub fn state(&self) -> ClickState {
        self.state
    }

    pub fn timeout(&self) -> TimerId {
        self.timeout
    }

    /// Feed a button press
    pub fn on_press<A>(&mut self, timers: &mut Timers<'_, A>) -> Result<Option<Gesture>> {
        match self.state {
            ClickState::Idle => {
                timers.link(self.timeout)?;
                self.state = ClickState::Armed;
                Ok(None)
            }
            ClickState::Armed => {
                timers.unlink(self.timeout)?;
                self.state = ClickState::Idle;
                Ok(Some(Gesture::Double))
            }
        }
    }

    /// Feed the timeout expiry (the event is already unlinked by firing)
    ///
    /// A stale expiry while idle yields nothing.
    pub fn on_timeout(&mut self) -> Option<Gesture> {
        match self.state {
            ClickState::Armed => {
                self.state = ClickState::Idle;
                Some(Gesture::Single)
            }
            ClickState::Idle => None,
        }
    }
}
