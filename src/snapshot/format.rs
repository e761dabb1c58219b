//! Snapshot Wire Format
//!
//! Building blocks of the backup file format: the marker bytes, field
//! escaping, and the deadline timestamp layout.
//!
//! A snapshot is one UTF-8 text blob:
//!
//! ```text
//! string int\n      header: key kind, one space, value kind
//! ?visits&42&       a record: marker, key, value, deadline
//! ?session&7&...    deadline field carries the escaped timestamp
//! !                 terminator
//! ```
//!
//! Records are not newline-separated; each `?` starts a record and
//! thereby ends the previous one. Every field is percent-escaped, so the
//! marker bytes can never occur inside field data. A permanent entry
//! leaves its deadline field empty.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::borrow::Cow;
use std::string::FromUtf8Error;

/// Marker bytes that structure the record stream.
pub mod marker {
    /// Starts a record
    pub const RECORD: u8 = b'?';
    /// Separates the three fields of a record
    pub const FIELD: u8 = b'&';
    /// Terminates the stream
    pub const END: u8 = b'!';
}

/// Timestamp layout of the deadline field, millisecond precision plus a
/// timezone abbreviation, e.g. `05.03.2026 07:30:00.250 UTC`.
pub const DEADLINE_FORMAT: &str = "%d.%m.%Y %H:%M:%S%.3f %Z";

/// Percent-escapes a field so it cannot collide with the marker bytes.
#[inline]
pub fn escape_field(raw: &str) -> Cow<'_, str> {
    urlencoding::encode(raw)
}

/// Reverses [`escape_field`].
///
/// # Errors
///
/// Fails when the escaped bytes do not decode to valid UTF-8.
pub fn unescape_field(field: &str) -> Result<String, FromUtf8Error> {
    urlencoding::decode(field).map(|decoded| decoded.into_owned())
}

/// Renders a deadline in the [`DEADLINE_FORMAT`] layout.
pub fn format_deadline(deadline: DateTime<Utc>) -> String {
    deadline.format(DEADLINE_FORMAT).to_string()
}

/// Parses a deadline field back to a UTC timestamp.
///
/// The timezone abbreviation is matched but not interpreted; deadlines
/// are always written and read as UTC.
pub fn parse_deadline(field: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(field, DEADLINE_FORMAT).map(|naive| naive.and_utc())
}
