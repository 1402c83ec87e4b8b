use core::cmp::Ordering as Cmp;
use core::mem::MaybeUninit;

use crossbeam_utils::CachePadded;

use crate::ring::Ticket;
use crate::sync::{AtomicUsize, Ordering, UnsafeCell};
use crate::Full;

struct Slot<T> {
    /// Ticket this slot is waiting for. Equal to the ticket when free for
    /// that enqueue, ticket + 1 once filled, ticket + N once drained again.
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Lock-free bounded MPMC circular queue.
///
/// Producers and consumers race for logical tickets with a CAS on their
/// shared index, then hand the value over through the slot's own sequence
/// number (release store, acquire load). Each ticket is claimed by exactly
/// one enqueue and exactly one dequeue.
///
/// `N` must be a power of two and at least 2; anything else fails to
/// compile when the queue is instantiated.
///
/// ```
/// use circq_concurrent::MpmcCircularQueue;
///
/// let q = MpmcCircularQueue::<u32, 4>::new();
/// q.enqueue(1).unwrap();
/// assert_eq!(q.dequeue(), Some(1));
/// ```
///
/// ```compile_fail
/// let _q = circq_concurrent::MpmcCircularQueue::<u32, 3>::new();
/// ```
///
/// ```compile_fail
/// let _q = circq_concurrent::MpmcCircularQueue::<u32, 1>::new();
/// ```
///
/// No fairness is promised. A thread that keeps losing the CAS keeps
/// retrying; callers wanting a bounded wait should layer
/// [`retry`](crate::retry) on top.
pub struct MpmcCircularQueue<T, const N: usize> {
    buffer: Box<[Slot<T>]>,
    enqueue_index: CachePadded<AtomicUsize>,
    dequeue_index: CachePadded<AtomicUsize>,
}

unsafe impl<T: Send, const N: usize> Send for MpmcCircularQueue<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for MpmcCircularQueue<T, N> {}

impl<T, const N: usize> MpmcCircularQueue<T, N> {
    const CAPACITY_OK: () = assert!(
        N >= 2 && N.is_power_of_two(),
        "MPMC queue capacity must be a power of two and at least 2"
    );

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_OK;
        let buffer = (0..N)
            .map(|i| Slot {
                sequence: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            buffer,
            enqueue_index: CachePadded::new(AtomicUsize::new(0)),
            dequeue_index: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Claim the next free ticket and store `value` in its slot.
    ///
    /// Fails with the value handed back when the slot for the current
    /// ticket still holds an element from the previous lap.
    pub fn enqueue(&self, value: T) -> Result<(), Full<T>> {
        // Relaxed: the ticket is validated against the slot sequence below.
        let mut ticket = Ticket::<N>::new(self.enqueue_index.load(Ordering::Relaxed));
        let slot = loop {
            let slot = &self.buffer[ticket.slot()];
            let seq = slot.sequence.load(Ordering::Acquire);
            match ticket.lag(seq).cmp(&0) {
                Cmp::Equal => match self.enqueue_index.compare_exchange_weak(
                    ticket.get(),
                    ticket.next().get(),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break slot,
                    Err(current) => ticket = Ticket::new(current),
                },
                Cmp::Less => return Err(Full(value)),
                Cmp::Greater => {
                    ticket = Ticket::new(self.enqueue_index.load(Ordering::Relaxed));
                }
            }
        };

        slot.value.with_mut(|p| unsafe { (*p).write(value) });
        slot.sequence.store(ticket.published(), Ordering::Release);
        Ok(())
    }

    /// Claim the next filled ticket and move its value out.
    pub fn dequeue(&self) -> Option<T> {
        let mut ticket = Ticket::<N>::new(self.dequeue_index.load(Ordering::Relaxed));
        let slot = loop {
            let slot = &self.buffer[ticket.slot()];
            let seq = slot.sequence.load(Ordering::Acquire);
            match ticket.fill_lag(seq).cmp(&0) {
                Cmp::Equal => match self.dequeue_index.compare_exchange_weak(
                    ticket.get(),
                    ticket.next().get(),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break slot,
                    Err(current) => ticket = Ticket::new(current),
                },
                Cmp::Less => return None,
                Cmp::Greater => {
                    ticket = Ticket::new(self.dequeue_index.load(Ordering::Relaxed));
                }
            }
        };

        let value = slot.value.with(|p| unsafe { (*p).assume_init_read() });
        slot.sequence.store(ticket.next_lap(), Ordering::Release);
        Some(value)
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Approximate number of stored elements. Includes tickets that are
    /// claimed but not yet published.
    ///
    /// Advisory only: the two indices are read separately, so a racing
    /// reader can see a stale enqueue index behind the dequeue index. That
    /// case reads as empty.
    pub fn len(&self) -> usize {
        let dequeued = self.dequeue_index.load(Ordering::Relaxed);
        let enqueued = self.enqueue_index.load(Ordering::Relaxed);
        (enqueued.wrapping_sub(dequeued) as isize).clamp(0, N as isize) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn sequence_at(&self, slot: usize) -> usize {
        self.buffer[slot].sequence.load(Ordering::Acquire)
    }
}

impl<T, const N: usize> Default for MpmcCircularQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for MpmcCircularQueue<T, N> {
    fn drop(&mut self) {
        // With exclusive access every claimed ticket has been published.
        let end = self.enqueue_index.load(Ordering::Relaxed);
        let mut ticket = Ticket::<N>::new(self.dequeue_index.load(Ordering::Relaxed));
        while ticket.get() != end {
            self.buffer[ticket.slot()]
                .value
                .with_mut(|p| unsafe { (*p).assume_init_drop() });
            ticket = ticket.next();
        }
    }
}
