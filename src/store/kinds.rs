//! Key and Value Kind System
//!
//! The store works with a closed set of primitive kinds. Each kind has a
//! stable token (`int`, `float`, `bool`, `string`) that names it in the
//! snapshot header, and every supported key/value type knows how to render
//! itself as a snapshot field and how to parse itself back.
//!
//! Dispatch is driven entirely by the `KIND` associated constants on
//! [`StoreKey`] and [`StoreValue`], so the codec never inspects runtime
//! types.
//!
//! ## Supported Kinds
//!
//! | Kind     | Token    | Key | Value | Rust type  |
//! |----------|----------|-----|-------|------------|
//! | integer  | `int`    | yes | yes   | `i64`      |
//! | float    | `float`  | yes | yes   | [`FloatKey`] / `f64` |
//! | boolean  | `bool`   | no  | yes   | `bool`     |
//! | text     | `string` | yes | yes   | `String`   |
//!
//! ## Float Keys
//!
//! `f64` is not `Eq + Hash`, so it cannot index a `HashMap` directly.
//! [`FloatKey`] wraps it with bit-pattern equality: two keys are equal when
//! their IEEE-754 bit patterns are equal. This makes `NaN` equal to itself
//! and distinguishes `0.0` from `-0.0`.

use std::fmt;
use std::hash::{Hash, Hasher};

/// The kind of key a store is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// 64-bit signed integer keys
    Int,
    /// Floating-point keys (bit-pattern equality)
    Float,
    /// Text keys
    String,
}

impl KeyKind {
    /// Returns the header token for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Int => "int",
            KeyKind::Float => "float",
            KeyKind::String => "string",
        }
    }

    /// Looks up a kind from its header token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "int" => Some(KeyKind::Int),
            "float" => Some(KeyKind::Float),
            "string" => Some(KeyKind::String),
            _ => None,
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of value a store is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// 64-bit signed integer values
    Int,
    /// Floating-point values
    Float,
    /// Boolean values
    Bool,
    /// Text values
    String,
}

impl ValueKind {
    /// Returns the header token for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::String => "string",
        }
    }

    /// Looks up a kind from its header token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "int" => Some(ValueKind::Int),
            "float" => Some(ValueKind::Float),
            "bool" => Some(ValueKind::Bool),
            "string" => Some(ValueKind::String),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A type usable as a store key in the backup-enabled variant.
///
/// Keys must hash and compare for the entry map, cross thread boundaries
/// for the background tasks, and round-trip through a snapshot field.
pub trait StoreKey: Clone + Eq + Hash + Send + Sync + 'static {
    /// The kind tag written to the snapshot header.
    const KIND: KeyKind;

    /// Renders the key as an unescaped snapshot field.
    fn encode_field(&self) -> String;

    /// Parses a key back from an unescaped snapshot field.
    ///
    /// Returns `None` if the field is not a valid rendering of this kind.
    fn parse_field(field: &str) -> Option<Self>;
}

/// A type usable as a store value in the backup-enabled variant.
///
/// The plain store accepts any `Clone + Send + Sync + 'static` value; this
/// trait is required only where values must survive a snapshot.
pub trait StoreValue: Clone + Send + Sync + 'static {
    /// The kind tag written to the snapshot header.
    const KIND: ValueKind;

    /// Renders the value as an unescaped snapshot field.
    fn encode_field(&self) -> String;

    /// Parses a value back from an unescaped snapshot field.
    fn parse_field(field: &str) -> Option<Self>;
}

impl StoreKey for i64 {
    const KIND: KeyKind = KeyKind::Int;

    fn encode_field(&self) -> String {
        self.to_string()
    }

    fn parse_field(field: &str) -> Option<Self> {
        field.parse().ok()
    }
}

impl StoreKey for String {
    const KIND: KeyKind = KeyKind::String;

    fn encode_field(&self) -> String {
        self.clone()
    }

    fn parse_field(field: &str) -> Option<Self> {
        Some(field.to_string())
    }
}

impl StoreKey for FloatKey {
    const KIND: KeyKind = KeyKind::Float;

    fn encode_field(&self) -> String {
        self.0.to_string()
    }

    fn parse_field(field: &str) -> Option<Self> {
        field.parse::<f64>().ok().map(FloatKey)
    }
}

impl StoreValue for i64 {
    const KIND: ValueKind = ValueKind::Int;

    fn encode_field(&self) -> String {
        self.to_string()
    }

    fn parse_field(field: &str) -> Option<Self> {
        field.parse().ok()
    }
}

impl StoreValue for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn encode_field(&self) -> String {
        self.to_string()
    }

    fn parse_field(field: &str) -> Option<Self> {
        field.parse().ok()
    }
}

impl StoreValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn encode_field(&self) -> String {
        self.to_string()
    }

    fn parse_field(field: &str) -> Option<Self> {
        field.parse().ok()
    }
}

impl StoreValue for String {
    const KIND: ValueKind = ValueKind::String;

    fn encode_field(&self) -> String {
        self.clone()
    }

    fn parse_field(field: &str) -> Option<Self> {
        Some(field.to_string())
    }
}

/// An `f64` key with bit-pattern equality.
///
/// Two `FloatKey`s are equal when `f64::to_bits` agrees, which gives the
/// total equivalence `HashMap` needs: `NaN == NaN`, and `0.0 != -0.0`.
///
/// # Example
///
/// ```
/// use emberkv::FloatKey;
///
/// let a = FloatKey(1.5);
/// let b = FloatKey(1.5);
/// assert_eq!(a, b);
/// assert_eq!(f64::from(a), 1.5);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FloatKey(pub f64);

impl PartialEq for FloatKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatKey {}

impl Hash for FloatKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.to_bits());
    }
}

impl From<f64> for FloatKey {
    fn from(value: f64) -> Self {
        FloatKey(value)
    }
}

impl From<FloatKey> for f64 {
    fn from(key: FloatKey) -> Self {
        key.0
    }
}

impl fmt::Display for FloatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
