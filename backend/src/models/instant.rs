//! Canonical instants used as cross-source merge keys.

use chrono::{DateTime, SecondsFormat, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An absolute point in time, stored as microseconds since the Unix epoch.
///
/// Microseconds are the resolution of Postgres timestamps. Anything finer is
/// truncated on construction, so two readings of the same physical moment
/// always compare equal as keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant(i64);

impl Instant {
    /// Create an instant from microseconds since the Unix epoch.
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Raw microseconds since the Unix epoch.
    pub const fn as_micros(&self) -> i64 {
        self.0
    }

    /// Current wall-clock instant.
    pub fn now() -> Self {
        Self::from_datetime(&Utc::now())
    }

    /// Create from any timezone-aware chrono datetime.
    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self(dt.timestamp_micros())
    }

    /// Convert to chrono `DateTime<Utc>`.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Subtract a duration, returning `None` on overflow.
    pub fn checked_sub(&self, delta: TimeDelta) -> Option<Self> {
        delta
            .num_microseconds()
            .and_then(|micros| self.0.checked_sub(micros))
            .map(Self)
    }

    /// Add a duration, returning `None` on overflow.
    pub fn checked_add(&self, delta: TimeDelta) -> Option<Self> {
        delta
            .num_microseconds()
            .and_then(|micros| self.0.checked_add(micros))
            .map(Self)
    }

    /// RFC 3339 rendering in UTC (`Z` suffix, fraction only when non-zero).
    pub fn to_rfc3339(&self) -> String {
        self.to_datetime()
            .to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Instant {
    fn from(dt: DateTime<Tz>) -> Self {
        Self::from_datetime(&dt)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl FromStr for Instant {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateTime::parse_from_rfc3339(s).map(|dt| Self::from_datetime(&dt))
    }
}

impl Serialize for Instant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Instant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
