//! Ring position arithmetic.
//!
//! Both queues address their slot arrays through one of these two value
//! types so the wraparound rules live in exactly one place:
//!
//! - [`RingIndex`] is a physical slot index for a queue of usable capacity
//!   `N` backed by `N + 1` slots. One slot is always left empty so that
//!   `head == tail` means empty and `next(tail) == head` means full.
//! - [`Ticket`] is a logical position that only ever increases (wrapping on
//!   `usize` overflow). The slot is found by masking with `N - 1`, so `N`
//!   must be a power of two. Per-slot sequence numbers are expressed in
//!   ticket space.

/// Physical index into a ring of `N + 1` slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RingIndex<const N: usize>(usize);

impl<const N: usize> RingIndex<N> {
    /// Number of physical slots in the ring.
    pub const SLOTS: usize = N + 1;

    pub const ZERO: Self = Self(0);

    /// Wraps `raw` into the ring.
    #[inline]
    pub const fn new(raw: usize) -> Self {
        Self(raw % Self::SLOTS)
    }

    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }

    /// The following slot, wrapping from `N` back to `0`.
    #[inline]
    pub const fn next(self) -> Self {
        if self.0 == N {
            Self(0)
        } else {
            Self(self.0 + 1)
        }
    }

    /// Number of forward steps from `self` to `later`.
    #[inline]
    pub const fn distance_to(self, later: Self) -> usize {
        if later.0 >= self.0 {
            later.0 - self.0
        } else {
            Self::SLOTS - self.0 + later.0
        }
    }
}

/// Logical position in a power-of-two ring of `N` slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ticket<const N: usize>(usize);

impl<const N: usize> Ticket<N> {
    pub const MASK: usize = N - 1;

    #[inline]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Slot this ticket maps to.
    #[inline]
    pub const fn slot(self) -> usize {
        self.0 & Self::MASK
    }

    #[inline]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Sequence value a slot carries once this ticket's value is stored.
    #[inline]
    pub const fn published(self) -> usize {
        self.0.wrapping_add(1)
    }

    /// Sequence value a slot carries once this ticket's value is taken: the
    /// same slot's ticket on the next lap.
    #[inline]
    pub const fn next_lap(self) -> usize {
        self.0.wrapping_add(N)
    }

    /// Signed distance of a slot sequence from this ticket. Zero means the
    /// slot is free for this ticket, negative means the slot still holds a
    /// value from the previous lap.
    #[inline]
    pub const fn lag(self, seq: usize) -> isize {
        seq.wrapping_sub(self.0) as isize
    }

    /// Signed distance of a slot sequence from this ticket's published
    /// value. Zero means the value for this ticket is ready to be taken,
    /// negative means it has not been stored yet.
    #[inline]
    pub const fn fill_lag(self, seq: usize) -> isize {
        seq.wrapping_sub(self.published()) as isize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_index_wraps_after_capacity() {
        let mut idx = RingIndex::<3>::ZERO;
        let seen: Vec<_> = (0..9)
            .map(|_| {
                let cur = idx.get();
                idx = idx.next();
                cur
            })
            .collect();
        assert_eq!(seen, vec![0, 1, 2, 3, 0, 1, 2, 3, 0]);
        assert_eq!(RingIndex::<3>::SLOTS, 4);
    }

    #[test]
    fn ring_index_new_reduces_modulo_slots() {
        assert_eq!(RingIndex::<3>::new(4).get(), 0);
        assert_eq!(RingIndex::<3>::new(7).get(), 3);
        assert_eq!(RingIndex::<1>::new(1).next().get(), 0);
    }

    #[test]
    fn ring_index_distance_handles_wrap() {
        let a = RingIndex::<3>::new(3);
        let b = RingIndex::<3>::new(1);
        assert_eq!(a.distance_to(b), 2);
        assert_eq!(b.distance_to(a), 2);
        assert_eq!(a.distance_to(a), 0);
        assert_eq!(a.distance_to(a.next().next().next()), 3);
    }

    #[test]
    fn ticket_masks_into_slots() {
        let t = Ticket::<4>::new(13);
        assert_eq!(t.slot(), 1);
        assert_eq!(t.next().slot(), 2);
        assert_eq!(t.published(), 14);
        assert_eq!(t.next_lap(), 17);
        assert_eq!(Ticket::<4>::new(t.next_lap()).slot(), t.slot());
    }

    #[test]
    fn ticket_lag_signs() {
        let t = Ticket::<8>::new(16);
        // free for this lap
        assert_eq!(t.lag(16), 0);
        // previous lap still occupying the slot
        assert!(t.lag(9) < 0);
        // another thread already moved past
        assert!(t.lag(17) > 0);

        assert_eq!(t.fill_lag(17), 0);
        assert!(t.fill_lag(16) < 0);
        assert!(t.fill_lag(24) > 0);
    }

    #[test]
    fn ticket_survives_usize_overflow() {
        let t = Ticket::<4>::new(usize::MAX);
        assert_eq!(t.slot(), 3);
        assert_eq!(t.next().get(), 0);
        assert_eq!(t.next().slot(), 0);
        assert_eq!(t.published(), 0);
        assert_eq!(t.lag(0), 1);
        assert_eq!(t.fill_lag(0), 0);
        assert_eq!(t.next_lap(), 3);
    }
}
