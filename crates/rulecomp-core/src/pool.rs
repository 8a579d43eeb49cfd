// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scoped worker pool for independent sub-evaluations.
//!
//! Workers claim item indices from an atomic counter (work-stealing) and
//! results are reassembled in index order, so callers observe the same
//! output regardless of which worker ran which item.
//!
//! # Constraints
//!
//! - No nested pools: the evaluator only calls [`try_run_claimed`] from the
//!   thread that owns the `evaluate` call, never from inside a worker.
//! - Once an item fails, workers stop claiming new items. Every item below
//!   the failing index has already been claimed and runs to completion, so
//!   the reported error is always the one with the lowest index.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Runs `work(0..count)` on up to `workers` scoped threads.
///
/// Returns all results in index order, or the error of the lowest-indexed
/// failing item.
///
/// # Errors
///
/// The first (lowest index) error produced by `work`.
///
/// # Panics
///
/// Re-raises a panic from any worker thread.
pub(crate) fn try_run_claimed<T, E, F>(count: usize, workers: usize, work: F) -> Result<Vec<T>, E>
where
    T: Send,
    E: Send,
    F: Fn(usize) -> Result<T, E> + Sync,
{
    if workers <= 1 || count <= 1 {
        return (0..count).map(&work).collect();
    }

    let next = AtomicUsize::new(0);
    let failed = AtomicBool::new(false);
    let spawned = workers.min(count);

    let mut done: Vec<(usize, Result<T, E>)> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..spawned)
            .map(|_| {
                let next = &next;
                let failed = &failed;
                let work = &work;
                s.spawn(move || {
                    let mut local = Vec::new();
                    while !failed.load(Ordering::Acquire) {
                        let idx = next.fetch_add(1, Ordering::Relaxed);
                        if idx >= count {
                            break;
                        }
                        let result = work(idx);
                        if result.is_err() {
                            failed.store(true, Ordering::Release);
                        }
                        local.push((idx, result));
                    }
                    local
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|h| match h.join() {
                Ok(local) => local,
                Err(e) => std::panic::resume_unwind(e),
            })
            .collect()
    });

    done.sort_unstable_by_key(|(idx, _)| *idx);
    done.into_iter().map(|(_, result)| result).collect()
}
