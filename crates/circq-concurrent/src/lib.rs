//! Bounded lock-free circular queues
//!
//! - `spsc`: Wait-free single-producer single-consumer queue
//! - `mpmc`: Lock-free multi-producer multi-consumer queue (per-slot sequence numbers)
//! - `ring`: Ring position arithmetic shared by both queues
//! - `retry`: Caller-side polling with backoff on top of the non-blocking operations

pub mod mpmc;
pub mod retry;
pub mod ring;
pub mod spsc;
mod sync;
mod traits;

use core::fmt;

use thiserror::Error;

pub use mpmc::MpmcCircularQueue;
pub use spsc::CircularQueue;
pub use traits::{Pop, Push};

/// Returned by a push/enqueue on a full queue. Carries the rejected value
/// back to the caller untouched.
#[derive(Error, Clone, Copy, PartialEq, Eq)]
#[error("queue is full")]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Full(..)")
    }
}
