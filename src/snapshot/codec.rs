//! Snapshot Codec
//!
//! Serializes store records into the snapshot text format and decodes
//! snapshot bytes back into records.
//!
//! ## Design Decisions
//!
//! 1. **Kind tags over introspection** - the header names the key and
//!    value kinds (`string int`). A snapshot is matched against the
//!    compile-time `KIND` constants of the target store before any record
//!    is parsed; runtime values are never inspected to guess types.
//!
//! 2. **Whole-input decoding** - the complete snapshot is parsed and
//!    validated before a single record is handed back, so a malformed
//!    tail can never leave a caller with half a snapshot.
//!
//! 3. **Lenient terminator** - encode always writes the `!` terminator,
//!    but decode tolerates its absence; the record stream is unambiguous
//!    without it.
//!
//! ## Error Handling
//!
//! Decoding stops at the first problem and [`SnapshotError`] names the
//! offending field or record, which makes a corrupt backup file easy to
//! inspect by hand.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use std::string::FromUtf8Error;
use thiserror::Error;

use crate::snapshot::format::{self, marker};
use crate::store::kinds::{KeyKind, StoreKey, StoreValue, ValueKind};

/// Errors that can occur while decoding a snapshot.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SnapshotError {
    /// The input has no header line
    #[error("missing header line")]
    MissingHeader,

    /// The header is not exactly two kind tokens
    #[error("header must be two kind tokens, got {0:?}")]
    MalformedHeader(String),

    /// The snapshot was written by a store with a different key kind
    #[error("wrong key kind in header: expected {expected}, got {found:?}")]
    KeyKindMismatch {
        expected: KeyKind,
        found: String,
    },

    /// The snapshot was written by a store with a different value kind
    #[error("wrong value kind in header: expected {expected}, got {found:?}")]
    ValueKindMismatch {
        expected: ValueKind,
        found: String,
    },

    /// The record stream does not begin with the record marker
    #[error("expected record marker '?', got {0:#04x}")]
    BadRecordMarker(u8),

    /// A record does not split into key, value and deadline
    #[error("record {record:?} does not split into 3 fields (got {found})")]
    FieldCount {
        record: String,
        found: usize,
    },

    /// The snapshot is not valid UTF-8
    #[error("snapshot is not valid UTF-8")]
    NotUtf8,

    /// A percent-escaped field decoded to invalid UTF-8
    #[error("field holds invalid percent-encoding: {0}")]
    Escape(#[from] FromUtf8Error),

    /// A key field does not parse as the declared kind
    #[error("key {0:?} is not a valid {1}")]
    KeyParse(String, KeyKind),

    /// A value field does not parse as the declared kind
    #[error("value {0:?} is not a valid {1}")]
    ValueParse(String, ValueKind),

    /// A deadline field does not match the timestamp layout
    #[error("deadline {field:?} is malformed: {source}")]
    Deadline {
        field: String,
        source: chrono::ParseError,
    },
}

/// Result type for snapshot decoding.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// One entry as it crosses the snapshot format.
///
/// The deadline is absolute so it means the same thing when restored in a
/// later process.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord<K, V> {
    pub key: K,
    pub value: V,
    /// `None` for a permanent entry
    pub deadline: Option<DateTime<Utc>>,
}

impl<K, V> SnapshotRecord<K, V> {
    /// Creates a record for a permanent entry.
    pub fn permanent(key: K, value: V) -> Self {
        Self {
            key,
            value,
            deadline: None,
        }
    }

    /// Creates a record for a timed entry.
    pub fn timed(key: K, value: V, deadline: DateTime<Utc>) -> Self {
        Self {
            key,
            value,
            deadline: Some(deadline),
        }
    }
}

/// Encodes records into a complete snapshot.
///
/// Layout: kind header, `?key&value&deadline` per record with every field
/// percent-escaped, and the `!` terminator. Permanent entries leave the
/// deadline field empty.
pub fn encode<K: StoreKey, V: StoreValue>(records: &[SnapshotRecord<K, V>]) -> Bytes {
    let mut buf = BytesMut::with_capacity(16 + records.len() * 32);

    buf.put_slice(K::KIND.as_str().as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(V::KIND.as_str().as_bytes());
    buf.put_u8(b'\n');

    for record in records {
        buf.put_u8(marker::RECORD);
        buf.put_slice(format::escape_field(&record.key.encode_field()).as_bytes());
        buf.put_u8(marker::FIELD);
        buf.put_slice(format::escape_field(&record.value.encode_field()).as_bytes());
        buf.put_u8(marker::FIELD);
        if let Some(deadline) = record.deadline {
            buf.put_slice(format::escape_field(&format::format_deadline(deadline)).as_bytes());
        }
    }

    buf.put_u8(marker::END);
    buf.freeze()
}

/// Decodes a complete snapshot into records.
///
/// The header must name exactly the kinds of the target store. An empty
/// record stream (header only, with or without the terminator) is valid
/// and decodes to no records.
///
/// # Errors
///
/// Returns the first [`SnapshotError`] encountered; nothing is returned
/// for partially valid input.
pub fn decode<K: StoreKey, V: StoreValue>(
    input: &[u8],
) -> SnapshotResult<Vec<SnapshotRecord<K, V>>> {
    let text = std::str::from_utf8(input).map_err(|_| SnapshotError::NotUtf8)?;
    let (header, body) = text.split_once('\n').ok_or(SnapshotError::MissingHeader)?;

    let kinds: Vec<&str> = header.trim().split(' ').collect();
    if kinds.len() != 2 {
        return Err(SnapshotError::MalformedHeader(header.trim().to_string()));
    }
    match KeyKind::from_token(kinds[0]) {
        Some(kind) if kind == K::KIND => {}
        _ => {
            return Err(SnapshotError::KeyKindMismatch {
                expected: K::KIND,
                found: kinds[0].to_string(),
            })
        }
    }
    match ValueKind::from_token(kinds[1]) {
        Some(kind) if kind == V::KIND => {}
        _ => {
            return Err(SnapshotError::ValueKindMismatch {
                expected: V::KIND,
                found: kinds[1].to_string(),
            })
        }
    }

    let body = body.strip_suffix(marker::END as char).unwrap_or(body);
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let body = match body.strip_prefix(marker::RECORD as char) {
        Some(rest) => rest,
        None => return Err(SnapshotError::BadRecordMarker(body.as_bytes()[0])),
    };

    let mut records = Vec::new();
    for chunk in body.split(marker::RECORD as char) {
        records.push(parse_record(chunk)?);
    }
    Ok(records)
}

fn parse_record<K: StoreKey, V: StoreValue>(chunk: &str) -> SnapshotResult<SnapshotRecord<K, V>> {
    let fields: Vec<&str> = chunk.split(marker::FIELD as char).collect();
    if fields.len() != 3 {
        return Err(SnapshotError::FieldCount {
            record: chunk.to_string(),
            found: fields.len(),
        });
    }

    let key_field = format::unescape_field(fields[0])?;
    let value_field = format::unescape_field(fields[1])?;
    let deadline_field = format::unescape_field(fields[2])?;

    let key = K::parse_field(&key_field)
        .ok_or_else(|| SnapshotError::KeyParse(key_field.clone(), K::KIND))?;
    let value = V::parse_field(&value_field)
        .ok_or_else(|| SnapshotError::ValueParse(value_field.clone(), V::KIND))?;

    let deadline = if deadline_field.is_empty() {
        None
    } else {
        Some(
            format::parse_deadline(&deadline_field).map_err(|source| SnapshotError::Deadline {
                field: deadline_field.clone(),
                source,
            })?,
        )
    };

    Ok(SnapshotRecord {
        key,
        value,
        deadline,
    })
}
