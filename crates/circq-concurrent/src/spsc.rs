use core::mem::MaybeUninit;

use crossbeam_utils::CachePadded;

use crate::ring::RingIndex;
use crate::sync::{Arc, AtomicUsize, Ordering, UnsafeCell};
use crate::Full;

/// Wait-free SPSC bounded circular queue.
///
/// - One dedicated producer, one dedicated consumer
/// - Uses Acquire/Release ordering on the head/tail indices, no CAS
/// - `N` usable slots backed by `N + 1` physical slots; the spare slot
///   tells "empty" (`head == tail`) from "full" (`next(tail) == head`)
///
/// The queue is driven through the [`Producer`] and [`Consumer`] handles
/// returned by [`split`](Self::split). Neither handle is `Clone`, so there
/// is never more than one thread on each side.
///
/// ```
/// use circq_concurrent::CircularQueue;
///
/// let (mut tx, mut rx) = CircularQueue::<u32, 1>::new().split();
/// tx.push(7).unwrap();
/// assert!(tx.push(8).is_err());
/// assert_eq!(rx.pop(), Some(7));
/// ```
///
/// A zero-capacity queue is rejected at compile time:
///
/// ```compile_fail
/// let _q = circq_concurrent::CircularQueue::<u32, 0>::new();
/// ```
pub struct CircularQueue<T, const N: usize> {
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// Safety: producer and consumer touch disjoint slots, handed over through
// the release/acquire pair on head and tail; T must be Send
unsafe impl<T: Send, const N: usize> Send for CircularQueue<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for CircularQueue<T, N> {}

impl<T, const N: usize> CircularQueue<T, N> {
    const CAPACITY_OK: () = assert!(N >= 1, "circular queue capacity must be at least 1");

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_OK;
        let buf = (0..RingIndex::<N>::SLOTS)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            buf,
        }
    }

    /// Hand the queue to its producer and consumer.
    pub fn split(self) -> (Producer<T, N>, Consumer<T, N>) {
        let shared = Arc::new(self);
        (
            Producer {
                queue: Arc::clone(&shared),
            },
            Consumer { queue: shared },
        )
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Snapshot; may be stale as soon as it returns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Snapshot; may be stale as soon as it returns.
    #[inline]
    pub fn is_full(&self) -> bool {
        let tail = RingIndex::<N>::new(self.tail.load(Ordering::Acquire));
        tail.next().get() == self.head.load(Ordering::Acquire)
    }

    /// Snapshot of the number of stored elements.
    #[inline]
    pub fn len(&self) -> usize {
        let head = RingIndex::<N>::new(self.head.load(Ordering::Acquire));
        let tail = RingIndex::<N>::new(self.tail.load(Ordering::Acquire));
        head.distance_to(tail)
    }

    #[inline]
    fn slot(&self, idx: RingIndex<N>) -> &UnsafeCell<MaybeUninit<T>> {
        &self.buf[idx.get()]
    }
}

impl<T, const N: usize> Default for CircularQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for CircularQueue<T, N> {
    fn drop(&mut self) {
        // Drop elements still queued; both handles are gone at this point.
        let tail = RingIndex::<N>::new(self.tail.load(Ordering::Relaxed));
        let mut head = RingIndex::<N>::new(self.head.load(Ordering::Relaxed));
        while head != tail {
            self.slot(head)
                .with_mut(|p| unsafe { (*p).assume_init_drop() });
            head = head.next();
        }
    }
}

/// Create a queue of capacity `N` and split it.
pub fn channel<T, const N: usize>() -> (Producer<T, N>, Consumer<T, N>) {
    CircularQueue::new().split()
}

/// Producer side of the SPSC queue.
pub struct Producer<T, const N: usize> {
    queue: Arc<CircularQueue<T, N>>,
}

/// Consumer side of the SPSC queue.
pub struct Consumer<T, const N: usize> {
    queue: Arc<CircularQueue<T, N>>,
}

impl<T, const N: usize> Producer<T, N> {
    /// Store `value` at the tail unless the queue is full.
    ///
    /// Never blocks. On a full queue the value is handed back in [`Full`]
    /// and nothing else changes.
    #[inline]
    pub fn push(&mut self, value: T) -> Result<(), Full<T>> {
        let q = &*self.queue;
        let tail = RingIndex::<N>::new(q.tail.load(Ordering::Relaxed));
        let next = tail.next();
        if next.get() == q.head.load(Ordering::Acquire) {
            return Err(Full(value));
        }
        q.slot(tail).with_mut(|p| unsafe { (*p).write(value) });
        q.tail.store(next.get(), Ordering::Release);
        Ok(())
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        N
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

impl<T, const N: usize> Consumer<T, N> {
    /// Take the value at the head unless the queue is empty. Never blocks.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        let q = &*self.queue;
        let head = RingIndex::<N>::new(q.head.load(Ordering::Relaxed));
        if head.get() == q.tail.load(Ordering::Acquire) {
            return None;
        }
        let value = q.slot(head).with(|p| unsafe { (*p).assume_init_read() });
        q.head.store(head.next().get(), Ordering::Release);
        Some(value)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        N
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
