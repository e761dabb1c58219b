//! Store Module
//!
//! The in-memory heart of the crate: a typed, thread-safe entry map with
//! per-entry expiry. Plain stores hold any cloneable key/value pair;
//! backup-enabled stores restrict keys and values to the closed kind
//! system so entries can cross the snapshot format.
//!
//! Timed entries carry an absolute deadline. A background sweep task
//! evicts them once the deadline passes; the task starts lazily with the
//! first timed entry and stops itself as soon as none remain.
//!
//! ## Components
//!
//! - [`engine`]: the [`Store`] facade, its configuration and statistics
//! - [`kinds`]: the kind system shared with the snapshot codec
//! - expiry: deadline bookkeeping and the sweep task (internal)
//!
//! ## Example
//!
//! ```
//! use emberkv::store::{Store, StoreConfig};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store: Store<String, i64> = Store::new(StoreConfig::default());
//!
//! store.set("count".to_string(), 1);
//! store
//!     .set_with_expiry("flash".to_string(), 2, Duration::from_secs(5))
//!     .unwrap();
//!
//! assert_eq!(store.len(), 2);
//! assert_eq!(store.ttl(&"count".to_string()), Some(None));
//! # }
//! ```

pub mod engine;
pub(crate) mod expiry;
pub mod kinds;

// Re-export commonly used types
pub use engine::{Store, StoreConfig, StoreError, StoreStats, DEFAULT_SWEEP_INTERVAL};
pub use kinds::{FloatKey, KeyKind, StoreKey, StoreValue, ValueKind};
