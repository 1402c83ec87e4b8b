//! Polling helpers for callers that want to wait on a full or empty queue.
//!
//! The queues never block. These loops retry with [`Backoff`] (spin, then
//! yield) until the operation succeeds or an optional deadline passes.

use std::time::Instant;

use crossbeam_utils::Backoff;

use crate::traits::{Pop, Push};
use crate::Full;

/// Retry `try_push` until it succeeds or `deadline` passes. On timeout the
/// value is handed back.
pub fn push_until<T, P>(sink: &mut P, mut value: T, deadline: Option<Instant>) -> Result<(), Full<T>>
where
    P: Push<T> + ?Sized,
{
    let backoff = Backoff::new();
    loop {
        match sink.try_push(value) {
            Ok(()) => return Ok(()),
            Err(Full(back)) => value = back,
        }
        if expired(deadline) {
            return Err(Full(value));
        }
        backoff.snooze();
    }
}

/// Retry `try_pop` until a value arrives or `deadline` passes.
pub fn pop_until<T, C>(source: &mut C, deadline: Option<Instant>) -> Option<T>
where
    C: Pop<T> + ?Sized,
{
    let backoff = Backoff::new();
    loop {
        if let Some(value) = source.try_pop() {
            return Some(value);
        }
        if expired(deadline) {
            return None;
        }
        backoff.snooze();
    }
}

#[inline]
fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}
