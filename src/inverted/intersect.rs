// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Multi-threaded pairwise AND-merge over a shared work queue.
//!
//! AND is associative and commutative, so any pairing tree of the input
//! lists produces the same result; the only discipline required is that
//! every input is consumed exactly once and every intermediate result
//! re-enters the queue exactly once. `unprocessed` tracks how many queue
//! entries (inputs plus not-yet-consumed intermediate results) remain to be
//! paired; it starts at the input count and drops by one per pairing,
//! terminating the pool when it reaches 1.

use super::storage::Storage;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::thread;

struct Shared {
    queue: VecDeque<Vec<u64>>,
    unprocessed: usize,
}

/// Intersects the posting lists of `feature_ids` and returns their
/// ascending, deduplicated document-id intersection.
///
/// # Panics
///
/// Panics if `feature_ids` is empty -- the caller must supply at least one
/// feature id (`spec.md` §4.6, §7).
#[must_use]
pub fn intersect(storage: &Storage<'_>, feature_ids: &[u64]) -> Vec<u64> {
    assert!(
        !feature_ids.is_empty(),
        "intersect: caller must supply at least one feature id"
    );

    let lists: Vec<Vec<u64>> = feature_ids
        .iter()
        .map(|&f| storage.postings(f).map(Iterator::collect).unwrap_or_default())
        .collect();

    intersect_lists(lists)
}

/// Same pairwise AND-merge as [`intersect`], operating directly on
/// materialized lists rather than a [`Storage`] segment.
///
/// # Panics
///
/// Panics if `lists` is empty.
#[must_use]
pub fn intersect_lists(lists: Vec<Vec<u64>>) -> Vec<u64> {
    assert!(!lists.is_empty(), "intersect: caller must supply at least one list");

    if lists.len() == 1 {
        return lists.into_iter().next().expect("checked len == 1");
    }

    let worker_count = thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .min(8);
    let unprocessed = lists.len();

    log::debug!("inverted: intersecting {unprocessed} lists across {worker_count} workers");

    let shared = (
        Mutex::new(Shared {
            queue: lists.into_iter().collect(),
            unprocessed,
        }),
        Condvar::new(),
    );

    thread::scope(|scope| {
        for _ in 0..worker_count {
            scope.spawn(|| worker_loop(&shared));
        }
    });

    let (lock, _condvar) = &shared;
    lock.lock()
        .expect("intersection queue mutex poisoned")
        .queue
        .pop_front()
        .expect("exactly one list remains once every worker has joined")
}

fn worker_loop(shared: &(Mutex<Shared>, Condvar)) {
    let (lock, condvar) = shared;

    loop {
        let pair = {
            let mut guard = lock.lock().expect("intersection queue mutex poisoned");
            loop {
                if guard.queue.len() >= 2 {
                    break;
                }
                if guard.unprocessed <= 1 {
                    condvar.notify_all();
                    return;
                }
                guard = condvar.wait(guard).expect("intersection queue mutex poisoned");
            }

            let a = guard.queue.pop_front().expect("queue length checked >= 2");
            let b = guard.queue.pop_front().expect("queue length checked >= 2");
            guard.unprocessed -= 1;
            (a, b)
        };

        let merged = merge_sorted(&pair.0, &pair.1);

        let mut guard = lock.lock().expect("intersection queue mutex poisoned");
        guard.queue.push_back(merged);
        condvar.notify_one();
    }
}

/// Classic two-pointer intersection of two ascending, deduplicated streams.
/// Equal elements are emitted once and both sides advance; otherwise the
/// smaller side advances.
#[must_use]
pub fn merge_sorted(a: &[u64], b: &[u64]) -> Vec<u64> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0usize, 0usize);

    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }

    out
}
