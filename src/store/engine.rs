//! Thread-Safe Expiring Store
//!
//! The core engine: a typed entry map plus a deadline tracker, shared with
//! the background tasks through an `Arc`. The [`Store`] handle owns the
//! shutdown channel; everything else lives in [`StoreInner`].
//!
//! ## Design Decisions
//!
//! 1. **RwLock over the entry map** - lookups dominate the workload, so
//!    readers proceed in parallel and writers serialize.
//!
//! 2. **Two locks, one order** - the entry map and the deadline tracker are
//!    guarded separately so lookups never contend with deadline churn. Any
//!    path that needs both takes the entry map first, then the tracker.
//!
//! 3. **Absolute deadlines** - timed writes record a wall-clock deadline
//!    (`now + ttl`) instead of a countdown, so deadlines can be serialized
//!    into a snapshot and still mean the same thing after a restart.
//!
//! 4. **Lazy sweeper** - the eviction task starts with the first timed
//!    entry and exits when the tracker drains. A store holding only
//!    permanent entries runs no background work.
//!
//! 5. **Runtime handle captured at construction** - operations may be
//!    called from plain threads, so the constructor grabs the ambient
//!    Tokio handle and spawns onto it later.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       StoreInner<K, V>                     │
//! │                                                            │
//! │   ┌────────────────────┐      ┌─────────────────────────┐  │
//! │   │     Entry map      │      │     Expiry tracker      │  │
//! │   │  RwLock<HashMap>   │      │  Mutex<deadlines, flag> │  │
//! │   │      K -> V        │      │  K -> DateTime<Utc>     │  │
//! │   └──────────▲─────────┘      └────────────▲────────────┘  │
//! │              │      lock order: map first  │               │
//! │              └─────────────┬───────────────┘               │
//! │                            │                               │
//! │            callers, sweep task, backup task                │
//! └────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

use crate::backup::report::BackupReport;
use crate::backup::scheduler::{self, BackupConfig};
use crate::snapshot::codec::SnapshotRecord;
use crate::store::expiry::{self, ExpiryTracker, SweepOutcome};
use crate::store::kinds::{StoreKey, StoreValue};

/// Sweep interval used by [`StoreConfig::default`].
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Errors returned by store mutations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A timed write was given a zero duration
    #[error("expiry duration must be greater than zero")]
    ZeroExpiry,
}

/// Configuration for a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How often the background sweep evicts expired entries
    pub sweep_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl StoreConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// Point-in-time operation counters for a store.
///
/// Counters are bumped with relaxed atomics; a snapshot is consistent
/// enough for monitoring, not for accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// Entries currently stored (expired entries count until swept)
    pub keys: u64,
    /// Lookups that found a value
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Writes, plain and timed
    pub sets: u64,
    /// Entries removed by delete
    pub deletes: u64,
    /// Entries evicted by the sweeper
    pub expired: u64,
}

/// Shared state behind a [`Store`] handle.
///
/// Lock order is fixed: `data` first, `tracker` second. Every path that
/// holds both guards acquires them in that order.
pub(crate) struct StoreInner<K, V> {
    data: RwLock<HashMap<K, V>>,
    tracker: ExpiryTracker<K>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    set_count: AtomicU64,
    del_count: AtomicU64,
    expired_count: AtomicU64,
}

impl<K, V> StoreInner<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            tracker: ExpiryTracker::new(),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Runs one eviction pass over the deadline map.
    pub(crate) fn sweep_expired(&self) -> SweepOutcome {
        let now = Utc::now();
        let mut data = self.data.write().unwrap();
        let outcome = self.tracker.sweep(&mut data, now);
        drop(data);

        if outcome.removed > 0 {
            self.expired_count
                .fetch_add(outcome.removed as u64, Ordering::Relaxed);
        }
        outcome
    }

    /// Clears the sweeper flag so a later timed write spawns a new task.
    pub(crate) fn release_sweeper(&self) {
        self.tracker.lock().sweeper_running = false;
    }

    /// Collects a fuzzy snapshot of the current contents.
    ///
    /// Keys are listed under one read guard, then each deadline and value
    /// is fetched under its own short-lived guard. Writes that land while
    /// the walk runs may or may not appear; keys evicted mid-walk are
    /// skipped. Neither lock is ever held together with the other here, so
    /// concurrent gets and sets proceed freely.
    pub(crate) fn collect_records(&self) -> Vec<SnapshotRecord<K, V>> {
        let keys: Vec<K> = self.data.read().unwrap().keys().cloned().collect();

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            // Deadline before value: a key swept between the two reads
            // drops out instead of coming back as permanent.
            let deadline = self.tracker.deadline_of(&key);
            let value = match self.data.read().unwrap().get(&key) {
                Some(value) => value.clone(),
                None => continue,
            };
            records.push(SnapshotRecord {
                key,
                value,
                deadline,
            });
        }
        records
    }
}

/// A concurrent in-memory key-value store with per-entry expiry and
/// optional periodic file backups.
///
/// `Store` is a handle around shared state. It is deliberately not
/// `Clone`: dropping the handle signals every background task to stop.
/// Share one store across threads behind an [`Arc`].
///
/// A plain store accepts any cloneable key/value pair. The backup-enabled
/// variant additionally requires [`StoreKey`] and [`StoreValue`] so
/// entries can cross the snapshot format.
///
/// # Example
///
/// ```
/// use emberkv::{Store, StoreConfig};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store: Store<String, i64> = Store::new(StoreConfig::default());
///
/// store.set("visits".to_string(), 42);
/// store
///     .set_with_expiry("session".to_string(), 7, Duration::from_secs(30))
///     .unwrap();
///
/// assert_eq!(store.get(&"visits".to_string()), Some(42));
/// assert_eq!(store.len(), 2);
/// # }
/// ```
pub struct Store<K, V> {
    inner: Arc<StoreInner<K, V>>,
    config: StoreConfig,
    backup: Option<BackupConfig>,
    shutdown_tx: watch::Sender<bool>,
    runtime: Handle,
}

impl<K, V> Store<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty store.
    ///
    /// # Panics
    ///
    /// Panics outside a Tokio runtime: the runtime handle is captured here
    /// so later writes can spawn the expiry sweeper onto it.
    pub fn new(config: StoreConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(StoreInner::new()),
            config,
            backup: None,
            shutdown_tx,
            runtime: Handle::current(),
        }
    }

    /// Returns a clone of the value stored under `key`.
    ///
    /// Lookups never consult deadlines: an entry past its deadline stays
    /// visible until a sweep pass evicts it.
    pub fn get(&self, key: &K) -> Option<V> {
        let data = self.inner.data.read().unwrap();
        match data.get(key) {
            Some(value) => {
                self.inner.hit_count.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            None => {
                self.inner.miss_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts or replaces the entry under `key`.
    ///
    /// A plain set always clears any recorded deadline, so the entry
    /// becomes permanent no matter how it was written before.
    pub fn set(&self, key: K, value: V) {
        self.inner.set_count.fetch_add(1, Ordering::Relaxed);
        self.set_plain(key, value);
    }

    /// Inserts or replaces the entry under `key`, evicting it once `ttl`
    /// elapses.
    ///
    /// The deadline is absolute (`now + ttl`) and replaces any previous
    /// deadline for the key. The first timed entry starts the background
    /// sweeper.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ZeroExpiry`] when `ttl` is zero; the store is
    /// left untouched.
    pub fn set_with_expiry(&self, key: K, value: V, ttl: Duration) -> Result<(), StoreError> {
        if ttl.is_zero() {
            return Err(StoreError::ZeroExpiry);
        }
        self.inner.set_count.fetch_add(1, Ordering::Relaxed);
        self.set_with_deadline(key, value, Utc::now() + ttl);
        Ok(())
    }

    /// Removes the entry under `key` along with any deadline.
    ///
    /// Returns `true` when an entry was removed.
    pub fn delete(&self, key: &K) -> bool {
        let removed = {
            let mut data = self.inner.data.write().unwrap();
            let mut state = self.inner.tracker.lock();
            state.deadlines.remove(key);
            data.remove(key).is_some()
        };
        if removed {
            self.inner.del_count.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Returns `true` when an entry exists under `key`.
    ///
    /// Does not touch the hit/miss counters.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.data.read().unwrap().contains_key(key)
    }

    /// Number of entries currently stored.
    ///
    /// Entries past their deadline count until a sweep evicts them.
    pub fn len(&self) -> usize {
        self.inner.data.read().unwrap().len()
    }

    /// Returns `true` when the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry and every deadline.
    pub fn clear(&self) {
        let mut data = self.inner.data.write().unwrap();
        let mut state = self.inner.tracker.lock();
        data.clear();
        state.deadlines.clear();
    }

    /// Makes the entry under `key` permanent.
    ///
    /// Returns `true` when a deadline existed and was removed, `false`
    /// when the key is missing or already permanent.
    pub fn persist(&self, key: &K) -> bool {
        let data = self.inner.data.read().unwrap();
        if !data.contains_key(key) {
            return false;
        }
        self.inner.tracker.lock().deadlines.remove(key).is_some()
    }

    /// Arms or rearms a deadline on an existing entry.
    ///
    /// Returns `Ok(true)` when the deadline was set, `Ok(false)` when no
    /// entry exists under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ZeroExpiry`] when `ttl` is zero.
    pub fn expire(&self, key: &K, ttl: Duration) -> Result<bool, StoreError> {
        if ttl.is_zero() {
            return Err(StoreError::ZeroExpiry);
        }
        let deadline = Utc::now() + ttl;
        let start_sweeper = {
            let data = self.inner.data.read().unwrap();
            if !data.contains_key(key) {
                return Ok(false);
            }
            let mut state = self.inner.tracker.lock();
            state.deadlines.insert(key.clone(), deadline);
            let start = !state.sweeper_running;
            state.sweeper_running = true;
            start
        };
        if start_sweeper {
            self.spawn_sweeper();
        }
        Ok(true)
    }

    /// Remaining lifetime of the entry under `key`.
    ///
    /// `None` when the key is missing, `Some(None)` for a permanent entry,
    /// `Some(Some(remaining))` for a timed one. The remaining duration
    /// saturates at zero once the deadline has passed.
    pub fn ttl(&self, key: &K) -> Option<Option<Duration>> {
        let deadline = {
            let data = self.inner.data.read().unwrap();
            if !data.contains_key(key) {
                return None;
            }
            self.inner.tracker.lock().deadlines.get(key).copied()
        };
        Some(deadline.map(|deadline| (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO)))
    }

    /// Absolute deadline recorded for `key`, if any.
    pub fn expires_at(&self, key: &K) -> Option<DateTime<Utc>> {
        self.inner.tracker.deadline_of(key)
    }

    /// Returns a snapshot of the operation counters.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            keys: self.inner.data.read().unwrap().len() as u64,
            hits: self.inner.hit_count.load(Ordering::Relaxed),
            misses: self.inner.miss_count.load(Ordering::Relaxed),
            sets: self.inner.set_count.load(Ordering::Relaxed),
            deletes: self.inner.del_count.load(Ordering::Relaxed),
            expired: self.inner.expired_count.load(Ordering::Relaxed),
        }
    }

    /// Installs restored records, skipping those already past deadline.
    ///
    /// Restored writes bypass the operation counters so a restart does not
    /// inflate them. Returns how many entries were installed.
    pub(crate) fn apply_snapshot(&self, records: Vec<SnapshotRecord<K, V>>) -> usize {
        let now = Utc::now();
        let mut installed = 0;
        for record in records {
            match record.deadline {
                None => self.set_plain(record.key, record.value),
                Some(deadline) if deadline > now => {
                    self.set_with_deadline(record.key, record.value, deadline)
                }
                Some(_) => continue,
            }
            installed += 1;
        }
        installed
    }

    fn set_plain(&self, key: K, value: V) {
        let mut data = self.inner.data.write().unwrap();
        let mut state = self.inner.tracker.lock();
        state.deadlines.remove(&key);
        data.insert(key, value);
    }

    fn set_with_deadline(&self, key: K, value: V, deadline: DateTime<Utc>) {
        let start_sweeper = {
            let mut data = self.inner.data.write().unwrap();
            let mut state = self.inner.tracker.lock();
            data.insert(key.clone(), value);
            state.deadlines.insert(key, deadline);
            let start = !state.sweeper_running;
            state.sweeper_running = true;
            start
        };
        if start_sweeper {
            self.spawn_sweeper();
        }
    }

    fn spawn_sweeper(&self) {
        let inner = Arc::clone(&self.inner);
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.runtime
            .spawn(expiry::sweep_loop(inner, self.config.sweep_interval, shutdown_rx));
        debug!("Expiry sweeper started");
    }
}

impl<K: StoreKey, V: StoreValue> Store<K, V> {
    /// Creates a store that restores from and periodically writes to a
    /// backup file.
    ///
    /// The restore runs before this returns: a readable snapshot is
    /// decoded in full and installed all-or-nothing, a missing file is
    /// created empty, and any failure leaves the store empty. The restore
    /// outcome is delivered through the configured report sink, as is the
    /// outcome of every later backup cycle.
    ///
    /// # Panics
    ///
    /// Panics outside a Tokio runtime.
    pub fn with_backup(config: StoreConfig, backup: BackupConfig) -> Self {
        let mut store = Self::new(config);
        scheduler::restore_store(&store, &backup);

        let inner = Arc::clone(&store.inner);
        let shutdown_rx = store.shutdown_tx.subscribe();
        store
            .runtime
            .spawn(scheduler::backup_loop(inner, backup.clone(), shutdown_rx));
        store.backup = Some(backup);
        store
    }

    /// Writes one backup immediately, outside the periodic schedule.
    ///
    /// Returns `None` when the store was built without a backup. Unlike
    /// the background loop, the report is handed straight back instead of
    /// going through the sink.
    pub async fn backup_now(&self) -> Option<BackupReport> {
        let backup = self.backup.as_ref()?;
        Some(scheduler::run_backup(&self.inner, backup).await)
    }
}

impl<K, V> Store<K, V> {
    /// Signals every background task owned by this store to stop.
    ///
    /// Idempotent. Entries stay readable afterwards, but expired entries
    /// are no longer evicted and periodic backups cease. Dropping the
    /// store calls this automatically.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        debug!("Store shutdown signalled");
    }
}

impl<K, V> Drop for Store<K, V> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<K, V> fmt::Debug for Store<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("entries", &self.inner.data.read().unwrap().len())
            .field("sweep_interval", &self.config.sweep_interval)
            .field("backup", &self.backup.is_some())
            .finish()
    }
}
