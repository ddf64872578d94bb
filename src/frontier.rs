// src/frontier.rs

//! The deduplicated set of discovered-but-unprocessed URLs.
//!
//! The frontier is the single source of truth for what remains to do.
//! All mutation goes through one internal lock; workers share the frontier
//! by `Arc` reference rather than through any process-wide state.
//!
//! A taken URL is in neither `pending` nor `done` until `complete` or
//! `release` runs: in-flight is implicit via ownership, not a third set.
//! Checkpoints are cut between chunks when nothing is in flight, so a
//! crash re-discovers at most one chunk of work.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use crate::models::{Checkpoint, TargetUrl};

#[derive(Debug, Default)]
struct Inner {
    /// FIFO order of pending targets
    queue: VecDeque<TargetUrl>,
    /// Index over `queue` for O(1) membership checks
    pending: HashSet<String>,
    /// URLs already processed, successfully or terminally failed
    done: HashSet<String>,
}

/// Thread-safe frontier of pending and completed target URLs.
///
/// Invariant: `pending` and `done` are disjoint; a URL is merged into
/// `pending` only if absent from both sets.
#[derive(Debug, Default)]
pub struct Frontier {
    inner: Mutex<Inner>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a frontier from a checkpoint snapshot.
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        let frontier = Self::new();
        {
            let mut inner = frontier.lock();
            inner.done = checkpoint.done.iter().cloned().collect();
            for target in &checkpoint.pending {
                if !inner.done.contains(&target.url) && inner.pending.insert(target.url.clone()) {
                    inner.queue.push_back(target.clone());
                }
            }
        }
        frontier
    }

    /// Merge discovered targets, skipping any URL already pending or done.
    ///
    /// Returns the number of targets actually added, so re-running any
    /// strategy is idempotent with respect to frontier contents.
    pub fn merge(&self, targets: impl IntoIterator<Item = TargetUrl>) -> usize {
        let mut inner = self.lock();
        let mut added = 0;
        for target in targets {
            if inner.done.contains(&target.url) {
                continue;
            }
            if inner.pending.insert(target.url.clone()) {
                inner.queue.push_back(target);
                added += 1;
            }
        }
        added
    }

    /// Remove and return up to `n` targets from pending.
    ///
    /// Taken URLs belong to the caller until `complete` or `release`.
    pub fn take(&self, n: usize) -> Vec<TargetUrl> {
        let mut inner = self.lock();
        let count = n.min(inner.queue.len());
        let mut taken = Vec::with_capacity(count);
        for _ in 0..count {
            if let Some(target) = inner.queue.pop_front() {
                inner.pending.remove(&target.url);
                taken.push(target);
            }
        }
        taken
    }

    /// Record a terminal outcome for a previously taken URL.
    pub fn complete(&self, url: &str) {
        let mut inner = self.lock();
        inner.done.insert(url.to_string());
    }

    /// Return unprocessed taken targets to the front of pending.
    ///
    /// Used on cooperative cancellation so the persisted snapshot still
    /// covers work that was dequeued but never attempted.
    pub fn release(&self, targets: Vec<TargetUrl>) {
        let mut inner = self.lock();
        for target in targets.into_iter().rev() {
            if !inner.done.contains(&target.url) && inner.pending.insert(target.url.clone()) {
                inner.queue.push_front(target);
            }
        }
    }

    /// Snapshot pending targets and done URLs for checkpointing.
    pub fn snapshot(&self) -> (Vec<TargetUrl>, Vec<String>) {
        let inner = self.lock();
        let pending = inner.queue.iter().cloned().collect();
        let mut done: Vec<String> = inner.done.iter().cloned().collect();
        done.sort();
        (pending, done)
    }

    pub fn pending_len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn done_len(&self) -> usize {
        self.lock().done.len()
    }

    /// Whether a URL has already been processed.
    pub fn is_done(&self, url: &str) -> bool {
        self.lock().done.contains(url)
    }

    /// A panicked worker must not block the final checkpoint flush, so a
    /// poisoned lock hands back the inner state as-is.
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
