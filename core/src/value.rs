//! Value model shared by statement binding and row materialization.
//!
//! SQLite only stores five kinds of values. [`Value`] is the closed variant
//! over exactly those kinds; richer field types (booleans, timestamps, URIs)
//! are converted into it explicitly through the `From` impls below, and the
//! declared [`FieldType`] of a column decides how a stored value is read back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A value that can be bound to a statement parameter or read from a
/// result column.
///
/// # Examples
///
/// ```
/// use tablekit_core::Value;
///
/// assert_eq!(Value::from(true), Value::Integer(1));
/// assert_eq!(Value::from("abc"), Value::Text("abc".to_string()));
/// assert_eq!(Value::from(None::<i64>), Value::Null);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL NULL.
    #[default]
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit IEEE floating point number.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Binary blob.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns `true` if the value is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the integer payload, converting reals by truncation.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Real(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Returns the floating point payload, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the blob payload.
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(v) => Some(v),
            _ => None,
        }
    }

    /// Interprets an integer value as a boolean (`1` is `true`).
    pub fn as_bool(&self) -> Option<bool> {
        self.as_i64().map(|v| v == 1)
    }

    /// Interprets a numeric value as seconds since the Unix epoch.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        self.as_f64().and_then(seconds_to_timestamp)
    }

    /// Returns the storage class of this value, or `None` for NULL.
    pub fn storage_class(&self) -> Option<StorageClass> {
        match self {
            Self::Null => None,
            Self::Integer(_) => Some(StorageClass::Integer),
            Self::Real(_) => Some(StorageClass::Real),
            Self::Text(_) => Some(StorageClass::Text),
            Self::Blob(_) => Some(StorageClass::Blob),
        }
    }
}

/// Converts a timestamp to fractional seconds since the Unix epoch.
pub fn timestamp_to_seconds(ts: &DateTime<Utc>) -> f64 {
    ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_nanos()) / 1_000_000_000.0
}

/// Converts fractional seconds since the Unix epoch to a timestamp.
///
/// Returns `None` for non-finite or out-of-range inputs.
pub fn seconds_to_timestamp(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1_000_000_000.0).round() as u32;
    // Rounding can carry the fraction up to a full second.
    let (whole, nanos) = if nanos >= 1_000_000_000 {
        (whole + 1.0, 0)
    } else {
        (whole, nanos)
    };
    DateTime::from_timestamp(whole as i64, nanos)
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Real(f64::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Blob(v.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Real(timestamp_to_seconds(&v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// One of the four storage classes SQLite actually stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageClass {
    /// Signed integer.
    Integer,
    /// Floating point.
    Real,
    /// Text.
    Text,
    /// Raw bytes.
    Blob,
}

impl StorageClass {
    /// Returns the SQL type name used in column declarations.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        }
    }
}

/// Declared static type of a mapped field.
///
/// Drives both the column's SQL type and the accessor used when reading a
/// stored value back out of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Signed integer.
    Int,
    /// Boolean stored as `0` / `1`.
    Bool,
    /// Floating point.
    Double,
    /// Point in time stored as seconds since the Unix epoch.
    Timestamp,
    /// UTF-8 string.
    String,
    /// URI stored in its string form.
    Uri,
    /// Byte sequence.
    Bytes,
}

impl FieldType {
    /// Maps the field type onto its SQLite storage class.
    pub fn storage_class(self) -> StorageClass {
        match self {
            Self::Int | Self::Bool => StorageClass::Integer,
            Self::Double | Self::Timestamp => StorageClass::Real,
            Self::String | Self::Uri => StorageClass::Text,
            Self::Bytes => StorageClass::Blob,
        }
    }
}
