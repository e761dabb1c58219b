//! Expiry Tracking and Sweeping
//!
//! Timed entries are tracked in a deadline map that lives next to the entry
//! map but under its own mutex. A background Tokio task wakes on a fixed
//! interval, removes every entry whose deadline is not after the current
//! time, and exits once no deadlines remain.
//!
//! ## Design Decisions
//!
//! 1. **Deadlines live beside a sweeper flag in one mutex** - starting the
//!    sweep task races with concurrent timed writes, so the "is a sweeper
//!    running" flag sits in the same critical section as the deadline map.
//!    A writer that arms the first deadline flips the flag and spawns; the
//!    sweep clears the flag in the same pass that observes an empty map.
//!
//! 2. **Lock order: entry map before tracker** - every path that needs both
//!    guards takes the entry map lock first and the tracker mutex second.
//!    [`ExpiryTracker::sweep`] encodes this by requiring the caller to
//!    already hold the entry map mutably.
//!
//! 3. **Sweeps are batch removals** - one pass drains all due deadlines
//!    under a single pair of guards rather than waking per key.
//!
//! 4. **The sweep task is lazy** - it starts with the first timed entry and
//!    terminates as soon as the tracker drains, so a store holding only
//!    permanent entries has no background work at all.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use crate::store::engine::StoreInner;

/// Mutable tracker state, guarded by one mutex.
pub(crate) struct TrackerState<K> {
    /// Absolute deadline per timed key
    pub(crate) deadlines: HashMap<K, DateTime<Utc>>,
    /// Whether a sweep task currently owns the deadline map
    pub(crate) sweeper_running: bool,
}

/// Deadline bookkeeping for one store.
pub(crate) struct ExpiryTracker<K> {
    state: Mutex<TrackerState<K>>,
}

impl<K> ExpiryTracker<K> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState {
                deadlines: HashMap::new(),
                sweeper_running: false,
            }),
        }
    }

    /// Locks the tracker state.
    ///
    /// Callers that also hold the entry map must have taken it first.
    pub(crate) fn lock(&self) -> MutexGuard<'_, TrackerState<K>> {
        self.state.lock().unwrap()
    }
}

impl<K: Eq + Hash> ExpiryTracker<K> {
    /// Returns the deadline recorded for `key`, if any.
    pub(crate) fn deadline_of(&self, key: &K) -> Option<DateTime<Utc>> {
        self.lock().deadlines.get(key).copied()
    }

    /// Removes every entry whose deadline is not after `now` from both the
    /// deadline map and `data`.
    ///
    /// `data` must be the store's entry map with its write guard already
    /// held, which keeps the lock order fixed: entry map, then tracker.
    /// When the deadline map drains, the running flag is cleared in the
    /// same critical section so a racing timed write starts a fresh task.
    pub(crate) fn sweep<V>(&self, data: &mut HashMap<K, V>, now: DateTime<Utc>) -> SweepOutcome {
        let mut state = self.lock();
        let before = state.deadlines.len();
        state.deadlines.retain(|key, deadline| {
            if *deadline > now {
                true
            } else {
                data.remove(key);
                false
            }
        });
        let remaining = state.deadlines.len();
        if remaining == 0 {
            state.sweeper_running = false;
        }
        SweepOutcome {
            removed: before - remaining,
            remaining,
        }
    }
}

/// What one sweep pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SweepOutcome {
    /// Entries evicted in this pass
    pub(crate) removed: usize,
    /// Deadlines still pending; zero means the sweep task should exit
    pub(crate) remaining: usize,
}

/// Background task that evicts expired entries on a fixed interval.
///
/// Runs until the tracker drains or a shutdown signal arrives, whichever
/// comes first.
pub(crate) async fn sweep_loop<K, V>(
    inner: Arc<StoreInner<K, V>>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    inner.release_sweeper();
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let outcome = inner.sweep_expired();
        if outcome.removed > 0 {
            debug!(
                expired = outcome.removed,
                remaining = outcome.remaining,
                "Expired entries swept"
            );
        }
        if outcome.remaining == 0 {
            debug!("Expiry sweeper idle, stopping");
            return;
        }
    }
}
