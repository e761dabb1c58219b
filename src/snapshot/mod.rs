//! Snapshot Module
//!
//! The on-disk representation of a store: a small, human-readable text
//! format with a kind header, percent-escaped `?key&value&deadline`
//! records and a `!` terminator.
//!
//! The first line names the key and value kinds. A snapshot written by a
//! `Store<String, i64>` can only be read back by a store of the same
//! shape; anything else is rejected before a single record is parsed.
//!
//! ## Components
//!
//! - [`format`]: marker bytes, field escaping and the deadline layout
//! - [`codec`]: whole-snapshot encoding and decoding
//!
//! ## Example
//!
//! ```
//! use emberkv::snapshot::{decode, encode, SnapshotRecord};
//!
//! let records = vec![SnapshotRecord::permanent("visits".to_string(), 42i64)];
//!
//! let bytes = encode(&records);
//! assert_eq!(&bytes[..], b"string int\n?visits&42&!");
//! assert_eq!(decode::<String, i64>(&bytes).unwrap(), records);
//! ```

pub mod codec;
pub mod format;

// Re-export commonly used types
pub use codec::{decode, encode, SnapshotError, SnapshotRecord, SnapshotResult};
