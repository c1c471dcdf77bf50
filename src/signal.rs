//! Signal binding — ties a queue's readiness to its handler
//!
//! A queue "signals" by being non-empty. The scheduler polls that
//! predicate each cycle instead of running anything from interrupt
//! context, then calls the bound handler in main context.
//!
//! Author: Moroya Sakamoto

use crate::error::Result;
use crate::queue::Consumer;
use crate::scheduler::Context;

/// What the scheduler should do after a handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep running
    Continue,
    /// Stop once the current cycle completes
    Quit,
}

/// Queue handler — inspects (and usually only peeks) the head event
pub type Handler<T, const N: usize, A> =
    fn(&mut Consumer<'_, T, N>, &mut Context<'_, '_, A>) -> Result<Flow>;

/// Registration priority hint (lower number = higher priority)
///
/// Stored with every registration. The fair strategy ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub u8);

impl Priority {
    /// Latency-critical streams (input edges)
    pub const HIGH: Priority = Priority(1);
    /// Ordinary streams
    pub const NORMAL: Priority = Priority(2);
    /// Background streams (logging, telemetry)
    pub const LOW: Priority = Priority(3);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

/// Anything the scheduler can poll and dispatch
pub trait Source<A> {
    /// Readiness signal: true while events are pending
    fn is_ready(&self) -> bool;

    /// Service exactly one pending event
    fn dispatch(&mut self, cx: &mut Context<'_, '_, A>) -> Result<Flow>;

    /// Events lost to overflow so far
    fn dropped(&self) -> usize {
        0
    }
}

/// Queue consumer bound to its handler
pub struct Binding<'q, T, const N: usize, A> {
    consumer: Consumer<'q, T, N>,
    handler: Handler<T, N, A>,
}

/// Bind a queue's consumer side to `handler`
pub fn bind<'q, T: Copy, const N: usize, A>(
    consumer: Consumer<'q, T, N>,
    handler: Handler<T, N, A>,
) -> Binding<'q, T, N, A> {
    Binding { consumer, handler }
}

impl<T: Copy, const N: usize, A> Binding<'_, T, N, A> {
    /// The bound queue's consumer side
    pub fn consumer(&self) -> &Consumer<'_, T, N> {
        &self.consumer
    }
}

impl<T: Copy, const N: usize, A> Source<A> for Binding<'_, T, N, A> {
    fn is_ready(&self) -> bool {
        !self.consumer.is_empty()
    }

    /// Calls the handler, then consumes the head event unless the handler
    /// already did.
    fn dispatch(&mut self, cx: &mut Context<'_, '_, A>) -> Result<Flow> {
        let before = self.consumer.consumed();
        let flow = (self.handler)(&mut self.consumer, cx)?;
        if self.consumer.consumed() == before {
            self.consumer.pop();
        }
        Ok(flow)
    }

    fn dropped(&self) -> usize {
        self.consumer.dropped()
    }
}
