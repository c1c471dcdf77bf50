//! Event queue — bounded SPSC ring between interrupt and main context
//!
//! Fixed-size, no-alloc. The producer side may live in an interrupt
//! handler; the consumer side belongs to the scheduler. Indices are
//! free-running wrapping counters published with Release/Acquire using
//! plain loads and stores only, so cores without atomic read-modify-write
//! (MSP430, riscv32imc) are fine.
//!
//! Author: Moroya Sakamoto

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Bounded event queue
///
/// `N` must be a power of two (checked at compile time). All `N` slots are
/// usable: the queue is empty when `write == read` and full when
/// `write - read == N`.
///
/// The queue itself only offers [`EventQueue::split`]; pushing and popping
/// go through the [`Producer`] and [`Consumer`] handles, which makes the
/// single-producer/single-consumer contract a borrow-checker fact.
pub struct EventQueue<T, const N: usize> {
    /// Ring buffer storage
    buffer: [UnsafeCell<MaybeUninit<T>>; N],
    /// Write counter (owned by producer)
    write_idx: AtomicUsize,
    /// Read counter (owned by consumer)
    read_idx: AtomicUsize,
    /// Events rejected because the queue was full (owned by producer)
    dropped: AtomicUsize,
}

// Slots are handed over through the index protocol: a slot is written only
// while it is outside `read..write` and read only while inside it.
unsafe impl<T: Send, const N: usize> Sync for EventQueue<T, N> {}

impl<T: Copy, const N: usize> EventQueue<T, N> {
    const MASK: usize = {
        assert!(N.is_power_of_two(), "EventQueue capacity must be a power of two");
        N - 1
    };

    /// Create a new empty queue
    pub const fn new() -> Self {
        let _ = Self::MASK;
        Self {
            buffer: [const { UnsafeCell::new(MaybeUninit::uninit()) }; N],
            write_idx: AtomicUsize::new(0),
            read_idx: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Split into the producer and consumer handles
    pub fn split(&mut self) -> (Producer<'_, T, N>, Consumer<'_, T, N>) {
        let queue: &Self = self;
        (Producer { queue }, Consumer { queue })
    }

    /// Slot capacity
    pub const fn capacity(&self) -> usize {
        N
    }

    #[cfg(test)]
    fn starting_at(idx: usize) -> Self {
        let q = Self::new();
        q.write_idx.store(idx, Ordering::Relaxed);
        q.read_idx.store(idx, Ordering::Relaxed);
        q
    }

    fn len(&self) -> usize {
        // read first: a later write snapshot can only be larger
        let read = self.read_idx.load(Ordering::Acquire);
        let write = self.write_idx.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    fn slot(&self, idx: usize) -> *mut MaybeUninit<T> {
        self.buffer[idx & Self::MASK].get()
    }
}

impl<T: Copy, const N: usize> Default for EventQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer handle — the only way to push
///
/// Typically moved into a `critical_section::Mutex` reachable from one
/// interrupt handler.
pub struct Producer<'q, T, const N: usize> {
    queue: &'q EventQueue<T, N>,
}

impl<T: Copy, const N: usize> Producer<'_, T, N> {
    /// Push an event
    ///
    /// Never blocks. Returns false and drops the event if the queue is full;
    /// queued events are left untouched.
    pub fn push(&mut self, event: T) -> bool {
        let q = self.queue;
        let write = q.write_idx.load(Ordering::Relaxed);
        let read = q.read_idx.load(Ordering::Acquire);

        if write.wrapping_sub(read) >= N {
            let dropped = q.dropped.load(Ordering::Relaxed);
            q.dropped.store(dropped.wrapping_add(1), Ordering::Release);
            return false;
        }

        // SAFETY: `write` is outside `read..write`, the consumer won't touch it
        unsafe { q.slot(write).write(MaybeUninit::new(event)) };
        q.write_idx.store(write.wrapping_add(1), Ordering::Release);
        true
    }

    /// Events currently queued
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Events dropped on overflow since creation
    pub fn dropped(&self) -> usize {
        self.queue.dropped.load(Ordering::Acquire)
    }
}

/// Consumer handle — owned by the scheduler's binding
pub struct Consumer<'q, T, const N: usize> {
    queue: &'q EventQueue<T, N>,
}

impl<T: Copy, const N: usize> Consumer<'_, T, N> {
    /// Oldest unconsumed event, left in place
    pub fn peek(&self) -> Option<T> {
        let q = self.queue;
        let read = q.read_idx.load(Ordering::Relaxed);
        let write = q.write_idx.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        // SAFETY: `read` is inside `read..write`, published by the producer
        Some(unsafe { q.slot(read).read().assume_init() })
    }

    /// Remove and return the oldest event
    pub fn pop(&mut self) -> Option<T> {
        let event = self.peek()?;
        let q = self.queue;
        let read = q.read_idx.load(Ordering::Relaxed);
        q.read_idx.store(read.wrapping_add(1), Ordering::Release);
        Some(event)
    }

    /// Events currently queued
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Is the queue empty? (the inverse of the readiness signal)
    pub fn is_empty(&self) -> bool {
        self.queue.read_idx.load(Ordering::Relaxed) == self.queue.write_idx.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Events dropped on overflow since creation
    pub fn dropped(&self) -> usize {
        self.queue.dropped.load(Ordering::Acquire)
    }

    /// Total events consumed so far (wrapping)
    pub(crate) fn consumed(&self) -> usize {
        self.queue.read_idx.load(Ordering::Relaxed)
    }
}
