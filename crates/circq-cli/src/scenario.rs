//! Producer/consumer stress runs over the circular queues.
//!
//! Every run is checked, not just timed: SPSC runs verify strict FIFO,
//! MPMC runs verify that each value arrives exactly once and that each
//! consumer sees any single producer's values in the order they were sent.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, Builder, Scope, ScopedJoinHandle};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use circq_concurrent::retry::{pop_until, push_until};
use circq_concurrent::{spsc, MpmcCircularQueue};
use circq_core::{affinity, StressConfig, MAX_TOTAL_ITEMS, SUPPORTED_CAPACITIES};
use crossbeam_utils::Backoff;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Spsc,
    Mpmc,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scenario: Scenario,
    pub capacity: usize,
    pub producers: usize,
    pub consumers: usize,
    pub items_sent: u64,
    pub items_received: u64,
    pub elapsed_ms: f64,
    pub throughput_per_sec: f64,
    /// Strict FIFO over the whole run (SPSC only)
    pub fifo_ok: Option<bool>,
    /// Per-producer order as seen by each consumer (MPMC only)
    pub producer_order_ok: Option<bool>,
    pub exactly_once_ok: bool,
    pub timed_out: bool,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        !self.timed_out
            && self.exactly_once_ok
            && self.fifo_ok.unwrap_or(true)
            && self.producer_order_ok.unwrap_or(true)
    }
}

/// Run `scenario` with the queue capacity from `cfg`.
pub fn run(scenario: Scenario, cfg: &StressConfig) -> Result<RunReport> {
    macro_rules! with_capacity {
        ($run:ident) => {
            match cfg.capacity {
                2 => $run::<2>(cfg),
                4 => $run::<4>(cfg),
                64 => $run::<64>(cfg),
                1024 => $run::<1024>(cfg),
                65536 => $run::<65536>(cfg),
                other => anyhow::bail!(
                    "unsupported capacity {}; choose one of {:?}",
                    other,
                    SUPPORTED_CAPACITIES
                ),
            }
        };
    }

    if cfg.total_items().is_none() {
        anyhow::bail!(
            "{} producers x {} items exceeds the limit of {} items per run",
            cfg.producers,
            cfg.items_per_producer,
            MAX_TOTAL_ITEMS
        );
    }

    info!(
        ?scenario,
        capacity = cfg.capacity,
        producers = cfg.producers,
        consumers = cfg.consumers,
        items_per_producer = cfg.items_per_producer,
        "starting run"
    );
    let report = match scenario {
        Scenario::Spsc => with_capacity!(run_spsc),
        Scenario::Mpmc => with_capacity!(run_mpmc),
    }?;
    info!(
        passed = report.passed(),
        received = report.items_received,
        elapsed_ms = report.elapsed_ms,
        "run finished"
    );
    Ok(report)
}

fn pin_worker(enabled: bool, worker: usize, role: &str) {
    if !enabled {
        return;
    }
    let core = worker % affinity::available_cores();
    match affinity::pin_current_thread(core) {
        Ok(()) => debug!(role, core, "pinned worker"),
        Err(e) => warn!(role, core, "could not pin worker: {}", e),
    }
}

fn spawn_worker<'scope, 'env, T, F>(
    scope: &'scope Scope<'scope, 'env>,
    name: String,
    f: F,
) -> Result<ScopedJoinHandle<'scope, T>>
where
    F: FnOnce() -> T + Send + 'scope,
    T: Send + 'scope,
{
    Builder::new()
        .name(name.clone())
        .spawn_scoped(scope, f)
        .with_context(|| format!("spawning {}", name))
}

fn join_worker<T>(handle: ScopedJoinHandle<'_, T>) -> Result<T> {
    handle
        .join()
        .map_err(|_| anyhow!("worker thread panicked"))
}

fn run_spsc<const N: usize>(cfg: &StressConfig) -> Result<RunReport> {
    let items = cfg.items_per_producer;
    let pin = cfg.pin_threads;
    let (mut tx, mut rx) = spsc::channel::<u64, N>();
    let start = Instant::now();
    let deadline = start + cfg.timeout();

    let (sent, received, fifo_ok) = thread::scope(|s| -> Result<(u64, u64, bool)> {
        let producer = spawn_worker(s, "spsc-producer".into(), move || {
            pin_worker(pin, 0, "producer");
            let mut sent = 0u64;
            for v in 1..=items {
                if push_until(&mut tx, v, Some(deadline)).is_err() {
                    warn!(sent, "producer hit the deadline");
                    break;
                }
                sent += 1;
            }
            sent
        })?;
        let consumer = spawn_worker(s, "spsc-consumer".into(), move || {
            pin_worker(pin, 1, "consumer");
            let mut expected = 1u64;
            let mut received = 0u64;
            let mut fifo_ok = true;
            while received < items {
                let Some(v) = pop_until(&mut rx, Some(deadline)) else {
                    warn!(received, "consumer hit the deadline");
                    break;
                };
                if v != expected {
                    fifo_ok = false;
                }
                expected = v + 1;
                received += 1;
            }
            (received, fifo_ok)
        })?;
        let sent = join_worker(producer)?;
        let (received, fifo_ok) = join_worker(consumer)?;
        Ok((sent, received, fifo_ok))
    })?;

    let elapsed = start.elapsed();
    Ok(RunReport {
        scenario: Scenario::Spsc,
        capacity: N,
        producers: 1,
        consumers: 1,
        items_sent: sent,
        items_received: received,
        elapsed_ms: elapsed.as_secs_f64() * 1e3,
        throughput_per_sec: received as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        fifo_ok: Some(fifo_ok),
        producer_order_ok: None,
        exactly_once_ok: fifo_ok && received == sent,
        timed_out: sent < items || received < items,
    })
}

fn run_mpmc<const N: usize>(cfg: &StressConfig) -> Result<RunReport> {
    let items = cfg.items_per_producer;
    let producers = cfg.producers as u64;
    let Some(total) = items.checked_mul(producers) else {
        anyhow::bail!("item total overflows: {} x {}", producers, items);
    };
    let pin = cfg.pin_threads;
    let queue = MpmcCircularQueue::<u64, N>::new();
    let consumed = AtomicU64::new(0);
    let start = Instant::now();
    let deadline = start + cfg.timeout();

    let (sent, batches) = thread::scope(|s| -> Result<(u64, Vec<Vec<u64>>)> {
        let q = &queue;
        let consumed = &consumed;

        let mut producer_handles = Vec::with_capacity(cfg.producers);
        for id in 0..cfg.producers {
            let handle = spawn_worker(s, format!("mpmc-producer-{}", id), move || {
                pin_worker(pin, id, "producer");
                let mut sent = 0u64;
                for k in 0..items {
                    // Producer `id` owns the values congruent to id + 1 modulo the producer count.
                    let v = k * producers + id as u64 + 1;
                    if push_until(&mut &*q, v, Some(deadline)).is_err() {
                        warn!(producer = id, sent, "producer hit the deadline");
                        break;
                    }
                    sent += 1;
                }
                sent
            })?;
            producer_handles.push(handle);
        }

        let mut consumer_handles = Vec::with_capacity(cfg.consumers);
        for id in 0..cfg.consumers {
            let first_core = cfg.producers;
            let handle = spawn_worker(s, format!("mpmc-consumer-{}", id), move || {
                pin_worker(pin, first_core + id, "consumer");
                let backoff = Backoff::new();
                let mut out = Vec::new();
                while consumed.load(Ordering::Relaxed) < total {
                    match q.dequeue() {
                        Some(v) => {
                            consumed.fetch_add(1, Ordering::Relaxed);
                            out.push(v);
                            backoff.reset();
                        }
                        None if Instant::now() >= deadline => {
                            warn!(consumer = id, "consumer hit the deadline");
                            break;
                        }
                        None => backoff.snooze(),
                    }
                }
                out
            })?;
            consumer_handles.push(handle);
        }

        let mut sent = 0;
        for h in producer_handles {
            sent += join_worker(h)?;
        }
        let batches = consumer_handles
            .into_iter()
            .map(join_worker)
            .collect::<Result<Vec<_>>>()?;
        Ok((sent, batches))
    })?;

    let elapsed = start.elapsed();
    let check = check_mpmc(&batches, producers, items);
    Ok(RunReport {
        scenario: Scenario::Mpmc,
        capacity: N,
        producers: cfg.producers,
        consumers: cfg.consumers,
        items_sent: sent,
        items_received: check.received,
        elapsed_ms: elapsed.as_secs_f64() * 1e3,
        throughput_per_sec: check.received as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        fifo_ok: None,
        producer_order_ok: Some(check.producer_order_ok),
        exactly_once_ok: check.exactly_once_ok,
        timed_out: sent < total || check.received < total,
    })
}

#[derive(Debug, PartialEq, Eq)]
struct MpmcCheck {
    received: u64,
    exactly_once_ok: bool,
    producer_order_ok: bool,
}

/// Verify consumer batches against values `1..=producers * items`, where
/// producer `p` sent `p + 1, p + 1 + producers, ...` in increasing order.
///
/// The seen-set is only built when the received count matches, so its size
/// stays proportional to what the consumers actually returned.
fn check_mpmc(batches: &[Vec<u64>], producers: u64, items: u64) -> MpmcCheck {
    let total = producers.saturating_mul(items);
    let received = batches.iter().map(|b| b.len() as u64).sum::<u64>();
    let mut seen = (received == total).then(|| vec![false; total as usize]);
    let mut exactly_once_ok = seen.is_some();
    let mut producer_order_ok = true;

    for batch in batches {
        let mut last = vec![0u64; producers as usize];
        for &v in batch {
            if v == 0 || v > total {
                exactly_once_ok = false;
                continue;
            }
            if let Some(seen) = seen.as_mut() {
                if std::mem::replace(&mut seen[(v - 1) as usize], true) {
                    exactly_once_ok = false;
                }
            }
            let producer = ((v - 1) % producers) as usize;
            if v <= last[producer] {
                producer_order_ok = false;
            }
            last[producer] = v;
        }
    }

    MpmcCheck {
        received,
        exactly_once_ok: exactly_once_ok && seen.is_some_and(|seen| seen.iter().all(|&s| s)),
        producer_order_ok,
    }
}
