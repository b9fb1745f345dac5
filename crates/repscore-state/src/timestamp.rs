//! Serde module for timestamps written either as RFC 3339 strings or as
//! epoch seconds (integer or fractional).
//!
//! Serialization always produces RFC 3339. Use with
//! `#[serde(with = "repscore_state::timestamp")]`.

use chrono::{DateTime, TimeZone, Utc};
use serde::{self, de::Error as _, Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    EpochSeconds(f64),
}

pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serde::Serialize::serialize(date, serializer)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| D::Error::custom(format!("invalid timestamp {text:?}: {e}"))),
        RawTimestamp::EpochSeconds(secs) => from_epoch_seconds(secs)
            .ok_or_else(|| D::Error::custom(format!("epoch seconds {secs} out of range"))),
    }
}

/// Convert fractional Unix seconds to a UTC timestamp.
pub fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
    Utc.timestamp_opt(whole as i64, nanos).single()
}
