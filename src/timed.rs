//! Timed events — one-shot, cancellable delayed callbacks
//!
//! Static arena of timed event slots (no heap) plus an index of the
//! linked ones, kept sorted by expiry. Main context only: interrupt
//! handlers never link or unlink.
//!
//! Author: Moroya Sakamoto

use core::fmt;

use heapless::Vec;
use log::trace;

use crate::clock::{Deadline, Millis, MAX_DELAY_MS};
use crate::error::{Error, Result};
use crate::scheduler::Context;

/// Maximum timed events per list
pub const MAX_TIMERS: usize = 16;

/// Handle to a timed event slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u8);

impl TimerId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Timer callback — runs in main context once the event expires
pub type TimerFn<A> = fn(TimerId, &mut Context<'_, '_, A>) -> Result<()>;

/// Events that expired during one pass, in firing order
pub type Due = Vec<TimerId, MAX_TIMERS>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Unlinked,
    Linked(Deadline),
}

struct TimedEvent<A> {
    /// Relative delay applied at link time
    delay: Millis,
    callback: TimerFn<A>,
    link: Link,
}

/// Ordered list of armed timed events
///
/// Ties on expiry keep link order.
pub struct TimerList<A> {
    /// Slot arena, indexed by `TimerId`
    events: Vec<TimedEvent<A>, MAX_TIMERS>,
    /// Linked ids, ascending expiry
    pending: Vec<TimerId, MAX_TIMERS>,
}

impl<A> TimerList<A> {
    pub const fn new() -> Self {
        Self {
            events: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Allocate an unlinked timed event
    ///
    /// Delays longer than `MAX_DELAY_MS` are clamped.
    pub fn add(&mut self, delay_ms: Millis, callback: TimerFn<A>) -> Result<TimerId> {
        let id = TimerId(self.events.len() as u8);
        self.events
            .push(TimedEvent {
                delay: delay_ms.min(MAX_DELAY_MS),
                callback,
                link: Link::Unlinked,
            })
            .map_err(|_| Error::TooManyTimers)?;
        Ok(id)
    }

    /// Arm `id` to expire `delay` ms after `now`
    ///
    /// Linking an armed event resets its expiry.
    pub fn link(&mut self, id: TimerId, now: Millis) -> Result<()> {
        let event = self.event_mut(id)?;
        let deadline = Deadline::after(now, event.delay);
        let relinked = matches!(event.link, Link::Linked(_));
        event.link = Link::Linked(deadline);

        if relinked {
            self.pending.retain(|&p| p != id);
        }

        // Rank relative to `now` so a wrap between two expiries sorts right
        let rank = |d: Deadline| d.at().wrapping_sub(now) as i32;
        let new_rank = rank(deadline);
        let pos = self
            .pending
            .iter()
            .position(|&p| self.deadline(p).map_or(false, |d| rank(d) > new_rank))
            .unwrap_or(self.pending.len());
        self.pending
            .insert(pos, id)
            .map_err(|_| Error::TooManyTimers)?;

        trace!("{} linked, expires at {}", id, deadline.at());
        Ok(())
    }

    /// Disarm `id`; no-op if it isn't linked
    pub fn unlink(&mut self, id: TimerId) -> Result<()> {
        let event = self.event_mut(id)?;
        if event.link == Link::Unlinked {
            return Ok(());
        }
        event.link = Link::Unlinked;
        self.pending.retain(|&p| p != id);
        trace!("{} unlinked", id);
        Ok(())
    }

    /// Remove and return every event expired at `now`
    ///
    /// Events are unlinked before their callbacks run, so a callback that
    /// re-links its own event waits for a later pass, and an unlink issued
    /// during this pass no longer cancels anything already returned.
    pub fn due(&mut self, now: Millis) -> Due {
        let mut due = Due::new();
        while let Some(&id) = self.pending.first() {
            match self.deadline(id) {
                Some(d) if d.is_expired(now) => {}
                _ => break,
            }
            self.pending.remove(0);
            self.events[id.index()].link = Link::Unlinked;
            // pending never holds more ids than there are slots
            let _ = due.push(id);
        }
        due
    }

    pub fn is_linked(&self, id: TimerId) -> bool {
        self.deadline(id).is_some()
    }

    /// Absolute expiry of a linked event
    pub fn expiry(&self, id: TimerId) -> Option<Millis> {
        self.deadline(id).map(|d| d.at())
    }

    pub fn delay(&self, id: TimerId) -> Result<Millis> {
        Ok(self.event(id)?.delay)
    }

    /// Change the delay; an armed event keeps its current expiry
    pub fn set_delay(&mut self, id: TimerId, delay_ms: Millis) -> Result<()> {
        self.event_mut(id)?.delay = delay_ms.min(MAX_DELAY_MS);
        Ok(())
    }

    pub fn callback(&self, id: TimerId) -> Result<TimerFn<A>> {
        Ok(self.event(id)?.callback)
    }

    /// Earliest pending expiry
    pub fn next_expiry(&self) -> Option<Millis> {
        self.pending.first().and_then(|&id| self.expiry(id))
    }

    /// Time until the earliest pending expiry (0 if already due)
    pub fn time_until_next(&self, now: Millis) -> Option<Millis> {
        self.pending
            .first()
            .and_then(|&id| self.deadline(id))
            .map(|d| d.remaining(now))
    }

    /// Number of linked events
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of allocated slots
    pub fn timer_count(&self) -> usize {
        self.events.len()
    }

    /// Link/unlink handle evaluated at `now`
    pub fn at(&mut self, now: Millis) -> Timers<'_, A> {
        Timers {
            list: Some(self),
            now,
        }
    }

    fn deadline(&self, id: TimerId) -> Option<Deadline> {
        match self.events.get(id.index())?.link {
            Link::Linked(d) => Some(d),
            Link::Unlinked => None,
        }
    }

    fn event(&self, id: TimerId) -> Result<&TimedEvent<A>> {
        self.events.get(id.index()).ok_or(Error::UnknownTimer(id))
    }

    fn event_mut(&mut self, id: TimerId) -> Result<&mut TimedEvent<A>> {
        self.events.get_mut(id.index()).ok_or(Error::UnknownTimer(id))
    }
}

impl<A> Default for TimerList<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed view of a timer list pinned to one instant
///
/// Handed out by [`Context::split`] so a handler can arm timers while it
/// also holds `&mut` to its application state.
pub struct Timers<'t, A> {
    list: Option<&'t mut TimerList<A>>,
    now: Millis,
}

impl<'t, A> Timers<'t, A> {
    pub(crate) fn new(list: Option<&'t mut TimerList<A>>, now: Millis) -> Self {
        Self { list, now }
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn link(&mut self, id: TimerId) -> Result<()> {
        let now = self.now;
        self.list_mut()?.link(id, now)
    }

    pub fn unlink(&mut self, id: TimerId) -> Result<()> {
        self.list_mut()?.unlink(id)
    }

    pub fn is_linked(&self, id: TimerId) -> bool {
        self.list.as_ref().map_or(false, |l| l.is_linked(id))
    }

    fn list_mut(&mut self) -> Result<&mut TimerList<A>> {
        self.list.as_deref_mut().ok_or(Error::NoTimerSource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: TimerId, _: &mut Context<'_, '_, ()>) -> Result<()> {
        Ok(())
    }

    fn list_with(delays: &[Millis]) -> (TimerList<()>, heapless::Vec<TimerId, MAX_TIMERS>) {
        let mut list = TimerList::new();
        let mut ids = heapless::Vec::new();
        for &d in delays {
            ids.push(list.add(d, noop).unwrap()).unwrap();
        }
        (list, ids)
    }

    #[test]
    fn test_due_in_expiry_order() {
        let (mut list, ids) = list_with(&[300, 100, 200]);
        for &id in &ids {
            list.link(id, 0).unwrap();
        }
        assert_eq!(list.len(), 3);
        assert_eq!(list.next_expiry(), Some(100));

        assert!(list.due(99).is_empty());
        assert_eq!(list.due(250).as_slice(), &[ids[1], ids[2]]);
        assert_eq!(list.due(1000).as_slice(), &[ids[0]]);
        assert!(list.is_empty());
    }

    #[test]
    fn test_equal_expiry_fires_in_link_order() {
        let (mut list, ids) = list_with(&[50, 50, 50]);
        list.link(ids[2], 10).unwrap();
        list.link(ids[0], 10).unwrap();
        list.link(ids[1], 10).unwrap();
        assert_eq!(list.due(60).as_slice(), &[ids[2], ids[0], ids[1]]);
    }

    #[test]
    fn test_relink_resets_expiry() {
        let (mut list, ids) = list_with(&[100]);
        let id = ids[0];
        list.link(id, 0).unwrap();
        list.link(id, 80).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.expiry(id), Some(180));
        assert!(list.due(100).is_empty());
        assert_eq!(list.due(180).as_slice(), &[id]);
    }

    #[test]
    fn test_unlink_cancels() {
        let (mut list, ids) = list_with(&[100, 100]);
        list.link(ids[0], 0).unwrap();
        list.link(ids[1], 0).unwrap();
        list.unlink(ids[0]).unwrap();
        assert!(!list.is_linked(ids[0]));
        assert_eq!(list.due(500).as_slice(), &[ids[1]]);
        // Unlinking an unlinked event is a no-op
        list.unlink(ids[0]).unwrap();
    }

    #[test]
    fn test_due_unlinks() {
        let (mut list, ids) = list_with(&[10]);
        list.link(ids[0], 0).unwrap();
        let due = list.due(10);
        assert_eq!(due.len(), 1);
        assert!(!list.is_linked(ids[0]));
        assert_eq!(list.expiry(ids[0]), None);
        assert!(list.due(10).is_empty());
    }

    #[test]
    fn test_expiry_across_wrap() {
        let (mut list, ids) = list_with(&[20, 5]);
        let now = u32::MAX - 10;
        list.link(ids[0], now).unwrap(); // expires at 9 (wrapped)
        list.link(ids[1], now).unwrap(); // expires at MAX - 5
        assert_eq!(list.next_expiry(), Some(u32::MAX - 5));
        assert!(list.due(u32::MAX - 6).is_empty());
        assert_eq!(list.due(u32::MAX - 5).as_slice(), &[ids[1]]);
        assert!(list.due(u32::MAX).is_empty());
        assert_eq!(list.time_until_next(u32::MAX), Some(10));
        assert_eq!(list.due(9).as_slice(), &[ids[0]]);
    }

    #[test]
    fn test_unknown_timer() {
        let (mut list, _) = list_with(&[10]);
        let (_, foreign) = list_with(&[1, 2, 3]);
        let stranger = foreign[2];
        assert_eq!(list.link(stranger, 0), Err(Error::UnknownTimer(stranger)));
        assert_eq!(list.unlink(stranger), Err(Error::UnknownTimer(stranger)));
        assert!(!list.is_linked(stranger));
    }

    #[test]
    fn test_table_full() {
        let mut list = TimerList::<()>::new();
        for _ in 0..MAX_TIMERS {
            assert!(list.add(10, noop).is_ok());
        }
        assert_eq!(list.add(10, noop), Err(Error::TooManyTimers));
        assert_eq!(list.timer_count(), MAX_TIMERS);
    }

    #[test]
    fn test_set_delay() {
        let (mut list, ids) = list_with(&[10]);
        list.set_delay(ids[0], 40).unwrap();
        assert_eq!(list.delay(ids[0]), Ok(40));
        list.link(ids[0], 100).unwrap();
        assert_eq!(list.expiry(ids[0]), Some(140));
        assert_eq!(list.time_until_next(110), Some(30));
    }

    #[test]
    fn test_detached_view() {
        let (_, ids) = list_with(&[10]);
        let mut timers = Timers::<()>::new(None, 0);
        assert_eq!(timers.link(ids[0]), Err(Error::NoTimerSource));
        assert!(!timers.is_linked(ids[0]));
    }

    #[test]
    fn test_view_links_at_its_instant() {
        let (mut list, ids) = list_with(&[25]);
        let mut timers = list.at(75);
        assert_eq!(timers.now(), 75);
        timers.link(ids[0]).unwrap();
        assert!(timers.is_linked(ids[0]));
        assert_eq!(list.expiry(ids[0]), Some(100));
    }
}
