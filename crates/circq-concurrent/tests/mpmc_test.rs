#![cfg(not(feature = "loom"))]

use circq_concurrent::retry::push_until;
use circq_concurrent::{Full, MpmcCircularQueue, Pop, Push};
use crossbeam_utils::Backoff;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_two_producers_one_consumer_capacity_four() {
    let q = MpmcCircularQueue::<u32, 4>::new();
    let odd: Vec<u32> = vec![1, 3, 5, 7];
    let even: Vec<u32> = vec![2, 4, 6, 8];

    let collected = thread::scope(|s| {
        for set in [&odd, &even] {
            let q = &q;
            s.spawn(move || {
                for &v in set {
                    push_until(&mut &*q, v, None).unwrap();
                }
            });
        }
        let consumer = s.spawn(|| {
            let mut out = Vec::new();
            let backoff = Backoff::new();
            while out.len() < 8 {
                match q.dequeue() {
                    Some(v) => out.push(v),
                    None => backoff.snooze(),
                }
            }
            out
        });
        consumer.join().unwrap()
    });

    let got: HashSet<u32> = collected.iter().copied().collect();
    assert_eq!(collected.len(), 8);
    assert_eq!(got, odd.iter().chain(even.iter()).copied().collect());
    assert!(q.is_empty());
}

#[test]
fn test_capacity_bound() {
    let q = MpmcCircularQueue::<usize, 8>::new();
    assert_eq!(q.capacity(), 8);
    for i in 0..8 {
        q.enqueue(i).unwrap();
    }
    assert_eq!(q.enqueue(8), Err(Full(8)));
    assert_eq!(q.len(), 8);
    assert_eq!(q.dequeue(), Some(0));
    q.enqueue(8).unwrap();
    assert!(q.enqueue(9).is_err());
}

#[test]
fn test_single_thread_fifo_many_laps() {
    let q = MpmcCircularQueue::<u64, 4>::new();
    let mut next = 0u64;
    let mut expected = 0u64;
    for _ in 0..500 {
        for _ in 0..fastrand::usize(0..=4) {
            if q.enqueue(next).is_ok() {
                next += 1;
            }
        }
        for _ in 0..fastrand::usize(0..=4) {
            if let Some(v) = q.dequeue() {
                assert_eq!(v, expected);
                expected += 1;
            }
        }
    }
    while let Some(v) = q.dequeue() {
        assert_eq!(v, expected);
        expected += 1;
    }
    assert_eq!(expected, next);
}

#[test]
fn test_no_loss_no_duplication_under_contention() {
    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 4;
    const PER_PRODUCER: usize = 25_000;
    const TOTAL: usize = PRODUCERS * PER_PRODUCER;

    let q = Arc::new(MpmcCircularQueue::<usize, 64>::new());
    let consumed = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                for k in 0..PER_PRODUCER {
                    push_until(&mut &*q, p * PER_PRODUCER + k, None).unwrap();
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let q = Arc::clone(&q);
            let consumed = Arc::clone(&consumed);
            thread::spawn(move || {
                let mut out = Vec::new();
                let backoff = Backoff::new();
                while consumed.load(Ordering::Relaxed) < TOTAL {
                    match q.dequeue() {
                        Some(v) => {
                            consumed.fetch_add(1, Ordering::Relaxed);
                            out.push(v);
                            backoff.reset();
                        }
                        None => backoff.snooze(),
                    }
                }
                out
            })
        })
        .collect();

    for p in producers {
        p.join().unwrap();
    }
    let mut seen = vec![false; TOTAL];
    let mut count = 0;
    for c in consumers {
        let values = c.join().unwrap();
        // Each consumer sees any one producer's values in enqueue order.
        let mut last = vec![None; PRODUCERS];
        for v in values {
            assert!(!seen[v], "value {v} dequeued twice");
            seen[v] = true;
            count += 1;
            let producer = v / PER_PRODUCER;
            if let Some(prev) = last[producer] {
                assert!(v > prev, "producer {producer} order broken: {prev} then {v}");
            }
            last[producer] = Some(v);
        }
    }
    assert_eq!(count, TOTAL);
    assert!(seen.into_iter().all(|s| s));
    assert!(q.is_empty());
}

#[test]
fn test_each_value_moved_exactly_once() {
    // Values own heap allocations; a double read or a lost slot shows up
    // as a wrong live count.
    let live = Arc::new(());
    let q = MpmcCircularQueue::<Arc<()>, 16>::new();
    thread::scope(|s| {
        for _ in 0..3 {
            s.spawn(|| {
                for _ in 0..5_000 {
                    let mut sink = &q;
                    if sink.try_push(Arc::clone(&live)).is_err() {
                        let mut source = &q;
                        drop(source.try_pop());
                    }
                }
            });
        }
        for _ in 0..2 {
            s.spawn(|| {
                for _ in 0..5_000 {
                    let mut source = &q;
                    drop(source.try_pop());
                }
            });
        }
    });
    assert_eq!(Arc::strong_count(&live), 1 + q.len());
    drop(q);
    assert_eq!(Arc::strong_count(&live), 1);
}

#[test]
fn test_non_blocking_on_full_and_empty() {
    let q = MpmcCircularQueue::<u8, 2>::new();
    let start = Instant::now();
    for _ in 0..10_000 {
        assert!(q.dequeue().is_none());
    }
    q.enqueue(1).unwrap();
    q.enqueue(2).unwrap();
    for _ in 0..10_000 {
        assert!(q.enqueue(3).is_err());
    }
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_full_failure_has_no_side_effect() {
    let q = MpmcCircularQueue::<String, 2>::new();
    q.enqueue("a".into()).unwrap();
    q.enqueue("b".into()).unwrap();
    let back = q.enqueue("c".into()).unwrap_err().into_inner();
    assert_eq!(back, "c");
    assert_eq!(q.dequeue().as_deref(), Some("a"));
    assert_eq!(q.dequeue().as_deref(), Some("b"));
    assert_eq!(q.dequeue(), None);
}
