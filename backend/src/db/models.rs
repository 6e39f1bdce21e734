//! Storage-level row types shared by repository implementations.
//!
//! These types carry timestamps exactly as the store holds them. Turning them into
//! canonical instants is the job of [`crate::services::normalize`].

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::SourceKind;

/// A timestamp as read from storage, before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTimestamp {
    /// Timezone-aware value (e.g. a `timestamptz` column)
    Aware(DateTime<FixedOffset>),
    /// Wall-clock value whose meaning depends on the source's [`TimestampStorage`]
    Naive(NaiveDateTime),
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        RawTimestamp::Aware(dt.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for RawTimestamp {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        RawTimestamp::Aware(dt)
    }
}

impl From<NaiveDateTime> for RawTimestamp {
    fn from(dt: NaiveDateTime) -> Self {
        RawTimestamp::Naive(dt)
    }
}

/// How a source stores its timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimestampStorage {
    /// Timezone-aware column
    #[default]
    Aware,
    /// Naive column holding UTC wall-clock time
    NaiveUtc,
    /// Naive column holding wall-clock time of the given zone
    NaiveLocal(Tz),
}

impl TimestampStorage {
    pub fn is_naive(&self) -> bool {
        !matches!(self, TimestampStorage::Aware)
    }
}

impl FromStr for TimestampStorage {
    type Err = String;

    /// Parse `aware`, `utc`, or an IANA zone name such as `Europe/Paris`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "aware" | "timestamptz" => Ok(Self::Aware),
            "utc" | "naive-utc" | "naive_utc" => Ok(Self::NaiveUtc),
            _ => s
                .trim()
                .parse::<Tz>()
                .map(Self::NaiveLocal)
                .map_err(|_| format!("Unknown timestamp storage: {}", s)),
        }
    }
}

impl TryFrom<String> for TimestampStorage {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimestampStorage> for String {
    fn from(storage: TimestampStorage) -> Self {
        storage.to_string()
    }
}

impl fmt::Display for TimestampStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampStorage::Aware => f.write_str("aware"),
            TimestampStorage::NaiveUtc => f.write_str("utc"),
            TimestampStorage::NaiveLocal(tz) => f.write_str(tz.name()),
        }
    }
}

/// Storage convention of each source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceStorage {
    #[serde(default)]
    pub actual: TimestampStorage,
    #[serde(default)]
    pub external_forecast: TimestampStorage,
    #[serde(default)]
    pub internal_forecast: TimestampStorage,
}

impl SourceStorage {
    pub fn get(&self, source: SourceKind) -> TimestampStorage {
        match source {
            SourceKind::Actual => self.actual,
            SourceKind::ExternalForecast => self.external_forecast,
            SourceKind::InternalForecast => self.internal_forecast,
        }
    }

    pub fn set(&mut self, source: SourceKind, storage: TimestampStorage) {
        match source {
            SourceKind::Actual => self.actual = storage,
            SourceKind::ExternalForecast => self.external_forecast = storage,
            SourceKind::InternalForecast => self.internal_forecast = storage,
        }
    }
}

/// One stored reading of a source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    /// Instant the value is about (the forecast target for forecasts)
    pub timestamp: RawTimestamp,
    pub value: f64,
    /// Producing model (internal forecasts only)
    pub model: Option<String>,
    /// When the forecast was generated (internal forecasts only)
    pub generated_at: Option<RawTimestamp>,
}

impl SourceRow {
    pub fn new(timestamp: impl Into<RawTimestamp>, value: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            value,
            model: None,
            generated_at: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn generated_at(mut self, generated_at: impl Into<RawTimestamp>) -> Self {
        self.generated_at = Some(generated_at.into());
        self
    }
}

/// Row filter applied by readers on top of the window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadFilter {
    /// Restrict internal forecasts to one model; ignored for other sources.
    pub model: Option<String>,
}

impl ReadFilter {
    pub fn model(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
        }
    }

    /// Model constraint that applies to `source`, if any.
    pub fn model_for(&self, source: SourceKind) -> Option<&str> {
        match source {
            SourceKind::InternalForecast => self.model.as_deref(),
            _ => None,
        }
    }
}

/// Raw per-source aggregates backing the status endpoint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceStats {
    pub count: i64,
    /// Latest timestamp; generation time for internal forecasts.
    pub latest: Option<RawTimestamp>,
}
