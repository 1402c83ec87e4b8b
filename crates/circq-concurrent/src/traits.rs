use crate::mpmc::MpmcCircularQueue;
use crate::spsc::{Consumer, Producer};
use crate::Full;

/// Write side of a bounded non-blocking FIFO.
pub trait Push<T> {
    fn try_push(&mut self, value: T) -> Result<(), Full<T>>;
}

/// Read side of a bounded non-blocking FIFO.
pub trait Pop<T> {
    fn try_pop(&mut self) -> Option<T>;
}

impl<T, const N: usize> Push<T> for Producer<T, N> {
    #[inline]
    fn try_push(&mut self, value: T) -> Result<(), Full<T>> {
        self.push(value)
    }
}

impl<T, const N: usize> Pop<T> for Consumer<T, N> {
    #[inline]
    fn try_pop(&mut self) -> Option<T> {
        self.pop()
    }
}

impl<T, const N: usize> Push<T> for &MpmcCircularQueue<T, N> {
    #[inline]
    fn try_push(&mut self, value: T) -> Result<(), Full<T>> {
        self.enqueue(value)
    }
}

impl<T, const N: usize> Pop<T> for &MpmcCircularQueue<T, N> {
    #[inline]
    fn try_pop(&mut self) -> Option<T> {
        self.dequeue()
    }
}
