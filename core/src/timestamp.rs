//! `serde` helpers for timestamp fields.
//!
//! Timestamp columns are stored and read back as fractional seconds since
//! the Unix epoch. Use these modules on `chrono::DateTime<Utc>` fields so
//! materialized rows decode into the structured type:
//!
//! ```
//! use chrono::{DateTime, Utc};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Event {
//!     #[serde(with = "tablekit_core::timestamp")]
//!     at: DateTime<Utc>,
//!     #[serde(default, with = "tablekit_core::timestamp::option")]
//!     acknowledged: Option<DateTime<Utc>>,
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

use crate::value::{seconds_to_timestamp, timestamp_to_seconds};

/// Serializes a timestamp as seconds since the epoch.
pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(timestamp_to_seconds(ts))
}

/// Deserializes a timestamp from seconds since the epoch.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let seconds = f64::deserialize(deserializer)?;
    seconds_to_timestamp(seconds)
        .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {seconds}")))
}

/// Same encoding for `Option<DateTime<Utc>>`; NULL maps to `None`.
pub mod option {
    use super::*;

    /// Serializes an optional timestamp.
    pub fn serialize<S: Serializer>(
        ts: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_some(&timestamp_to_seconds(ts)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes an optional timestamp.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<f64>::deserialize(deserializer)? {
            Some(seconds) => seconds_to_timestamp(seconds)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {seconds}"))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "crate::timestamp")]
        at: DateTime<Utc>,
        #[serde(default, with = "crate::timestamp::option")]
        seen: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_decode_from_seconds() {
        let decoded: Stamped = serde_json::from_str(r#"{"at": 1531526400.5, "seen": null}"#).unwrap();
        assert_eq!(
            decoded.at,
            DateTime::from_timestamp(1_531_526_400, 500_000_000).unwrap()
        );
        assert!(decoded.seen.is_none());
    }

    #[test]
    fn test_decode_from_integer_seconds() {
        let decoded: Stamped = serde_json::from_str(r#"{"at": 10, "seen": 20}"#).unwrap();
        assert_eq!(decoded.at, DateTime::from_timestamp(10, 0).unwrap());
        assert_eq!(decoded.seen, DateTime::from_timestamp(20, 0));
    }

    #[test]
    fn test_missing_optional_defaults_to_none() {
        let decoded: Stamped = serde_json::from_str(r#"{"at": 0}"#).unwrap();
        assert!(decoded.seen.is_none());
    }

    #[test]
    fn test_serialize_as_seconds() {
        let value = Stamped {
            at: DateTime::from_timestamp(5, 0).unwrap(),
            seen: None,
        };
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"at":5.0,"seen":null}"#
        );
    }
}
