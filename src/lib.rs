//! # EmberKV - An In-Memory Expiring Key-Value Store
//!
//! EmberKV is a typed, in-memory key-value store written in Rust. Entries
//! can expire on absolute deadlines, and the whole store can be snapshot
//! to a backup file on a fixed interval and restored on the next start.
//!
//! ## Features
//!
//! - **Typed Stores**: `Store<K, V>` over integer, float, boolean and text
//!   primitives, or any cloneable types when backups are not needed
//! - **Per-Entry Expiry**: absolute deadlines evicted by a background
//!   sweeper that starts lazily and stops itself when idle
//! - **Periodic Backups**: a human-readable snapshot file rewritten on an
//!   interval and restored all-or-nothing at construction
//! - **Async Outcome Reports**: every restore and backup cycle delivers a
//!   report through a channel instead of blocking callers
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            EmberKV                               │
//! │                                                                  │
//! │                 ┌────────────────────────────┐                   │
//! │                 │         Store<K, V>        │                   │
//! │                 │   get / set / set_with_    │                   │
//! │                 │   expiry / delete / ...    │                   │
//! │                 └───────┬─────────────┬──────┘                   │
//! │                         │             │                          │
//! │          ┌──────────────▼───┐   ┌─────▼───────────────┐          │
//! │          │    Entry map     │   │   Expiry tracker    │          │
//! │          │  RwLock<HashMap> │   │  Mutex<deadlines>   │          │
//! │          └──────────────▲───┘   └─────▲───────────────┘          │
//! │                         │             │                          │
//! │            ┌────────────┴───┐   ┌─────┴──────────┐               │
//! │            │  Backup loop   │   │  Expiry sweep  │               │
//! │            │  (Tokio task)  │   │  (Tokio task)  │               │
//! │            └───────┬────────┘   └────────────────┘               │
//! │                    │ snapshot codec                              │
//! │                    ▼                                             │
//! │              backup file ─────▶ restored on startup              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use emberkv::{BackupConfig, Store, StoreConfig};
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (report_tx, mut report_rx) = mpsc::unbounded_channel();
//!
//!     // Snapshot to /var/lib/emberkv/store.ekv once a minute
//!     let backup = BackupConfig::new(
//!         "/var/lib/emberkv",
//!         "store.ekv",
//!         Duration::from_secs(60),
//!         report_tx,
//!     );
//!     let store: Store<String, i64> = Store::with_backup(StoreConfig::default(), backup);
//!
//!     store.set("visits".to_string(), 1);
//!     store
//!         .set_with_expiry("session:42".to_string(), 7, Duration::from_secs(30))
//!         .unwrap();
//!
//!     // Outcomes of the restore and of every backup cycle arrive here
//!     while let Some(report) = report_rx.recv().await {
//!         println!("{report}");
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`store`]: the store facade, expiry machinery and the kind system
//! - [`snapshot`]: the snapshot text format and its codec
//! - [`backup`]: the restore step, the periodic backup task and reports
//!
//! ## Design Highlights
//!
//! ### Two Locks, One Order
//!
//! The entry map and the deadline tracker are guarded separately, so
//! lookups never contend with deadline churn. Every path that needs both
//! guards takes the entry map first and the tracker second, which makes
//! deadlock between writers and the sweep task impossible.
//!
//! ### Absolute Deadlines
//!
//! Timed writes record a wall-clock deadline rather than a countdown, and
//! snapshots carry it at millisecond precision. A restored entry therefore
//! expires exactly when it originally would have, even across restarts.
//!
//! ### Fuzzy Snapshots
//!
//! A backup walks the store without freezing it. Writes racing the walk
//! may or may not be captured and are durable by the next cycle at the
//! latest; in exchange, gets and sets never stall behind file i/o.
//!
//! ### All-or-Nothing Restore
//!
//! A snapshot is decoded and validated in full before a single record is
//! installed. A corrupt file reports a failure and leaves the store
//! empty, never half-filled.

pub mod backup;
pub mod snapshot;
pub mod store;

// Re-export commonly used types for convenience
pub use backup::{BackupConfig, BackupError, BackupProcess, BackupReport, BackupStatus, ReportSink};
pub use snapshot::{SnapshotError, SnapshotRecord};
pub use store::{
    FloatKey, KeyKind, Store, StoreConfig, StoreError, StoreKey, StoreStats, StoreValue, ValueKind,
};

/// Version of EmberKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
