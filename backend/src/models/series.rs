//! Source series, windows and merged records.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::instant::Instant;

/// One of the three independent origins of load data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Measured consumption
    Actual,
    /// Grid-operator forecast
    ExternalForecast,
    /// In-house model forecast
    InternalForecast,
}

impl SourceKind {
    /// All sources in canonical order.
    pub const ALL: [SourceKind; 3] = [
        SourceKind::Actual,
        SourceKind::ExternalForecast,
        SourceKind::InternalForecast,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Actual => "actual",
            SourceKind::ExternalForecast => "external_forecast",
            SourceKind::InternalForecast => "internal_forecast",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed `[start, end]` instant range a query is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    start: Instant,
    end: Instant,
}

impl Window {
    /// Build a window, or `None` when `end < start`.
    pub fn new(start: Instant, end: Instant) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn end(&self) -> Instant {
        self.end
    }

    /// Inclusive on both bounds.
    pub fn contains(&self, instant: Instant) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// A single reading of one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourcePoint {
    pub instant: Instant,
    pub value: f64,
    /// Producing model, only set for internal forecasts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl SourcePoint {
    pub fn new(instant: Instant, value: f64) -> Self {
        Self {
            instant,
            value,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// A source yielded two points for one normalized instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("source {kind} has more than one point at {instant}")]
pub struct DuplicateInstant {
    pub kind: SourceKind,
    pub instant: Instant,
}

/// Points of one source, strictly ascending by instant.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSeries {
    kind: SourceKind,
    points: Vec<SourcePoint>,
}

impl SourceSeries {
    /// Sort the points and reject duplicate instants.
    pub fn new(kind: SourceKind, mut points: Vec<SourcePoint>) -> Result<Self, DuplicateInstant> {
        points.sort_by_key(|p| p.instant);
        if let Some(pair) = points.windows(2).find(|w| w[0].instant == w[1].instant) {
            return Err(DuplicateInstant {
                kind,
                instant: pair[0].instant,
            });
        }
        Ok(Self { kind, points })
    }

    pub fn empty(kind: SourceKind) -> Self {
        Self {
            kind,
            points: Vec::new(),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn points(&self) -> &[SourcePoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<SourcePoint> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// One output row combining up to three sources at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MergedRecord {
    pub instant: Instant,
    pub actual: Option<f64>,
    pub external_forecast: Option<f64>,
    pub internal_forecast: Option<f64>,
}

impl MergedRecord {
    pub fn empty(instant: Instant) -> Self {
        Self {
            instant,
            actual: None,
            external_forecast: None,
            internal_forecast: None,
        }
    }

    pub fn value(&self, kind: SourceKind) -> Option<f64> {
        match kind {
            SourceKind::Actual => self.actual,
            SourceKind::ExternalForecast => self.external_forecast,
            SourceKind::InternalForecast => self.internal_forecast,
        }
    }

    pub fn set(&mut self, kind: SourceKind, value: f64) {
        let slot = match kind {
            SourceKind::Actual => &mut self.actual,
            SourceKind::ExternalForecast => &mut self.external_forecast,
            SourceKind::InternalForecast => &mut self.internal_forecast,
        };
        *slot = Some(value);
    }

    pub fn is_empty(&self) -> bool {
        SourceKind::ALL.iter().all(|kind| self.value(*kind).is_none())
    }
}
