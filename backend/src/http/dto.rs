//! Data Transfer Objects for the HTTP API.
//!
//! Every `date` is an RFC 3339 UTC instant. Conversion to a display timezone is
//! left to clients.

use serde::{Deserialize, Serialize};

use crate::db::models::ReadFilter;
use crate::models::{Instant, MergedRecord, SourcePoint};
use crate::services::{RangeQuery, SourceStatus, StatusReport};

/// Query parameters shared by the data endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeriesQuery {
    /// `7d`, `30d` or `90d`; anything else means 90 days
    pub range: Option<String>,
    /// Inclusive window start, ISO-8601
    pub start: Option<String>,
    /// Inclusive window end, ISO-8601
    pub end: Option<String>,
    /// Restrict internal forecasts to one model
    pub model: Option<String>,
}

impl SeriesQuery {
    pub fn range_query(&self) -> RangeQuery {
        RangeQuery {
            range: self.range.clone(),
            start: self.start.clone(),
            end: self.end.clone(),
        }
    }

    pub fn read_filter(&self) -> ReadFilter {
        ReadFilter {
            model: self
                .model
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
        }
    }
}

/// One observed consumption value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealPoint {
    pub date: Instant,
    pub true_value: f64,
    pub source: String,
}

impl From<SourcePoint> for RealPoint {
    fn from(point: SourcePoint) -> Self {
        Self {
            date: point.instant,
            true_value: point.value,
            source: "actual".to_string(),
        }
    }
}

/// One internal forecast value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPoint {
    pub date: Instant,
    pub our_forecast: f64,
    pub model: Option<String>,
}

impl From<SourcePoint> for PredictionPoint {
    fn from(point: SourcePoint) -> Self {
        Self {
            date: point.instant,
            our_forecast: point.value,
            model: point.model,
        }
    }
}

/// One external (grid operator) forecast value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RteForecastPoint {
    pub date: Instant,
    pub rte_forecast: f64,
    pub source: String,
}

impl From<SourcePoint> for RteForecastPoint {
    fn from(point: SourcePoint) -> Self {
        Self {
            date: point.instant,
            rte_forecast: point.value,
            source: "actual".to_string(),
        }
    }
}

/// One instant of the merged series; absent sources serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedPoint {
    pub date: Instant,
    pub true_value: Option<f64>,
    pub rte_forecast: Option<f64>,
    pub our_forecast: Option<f64>,
}

impl From<MergedRecord> for CombinedPoint {
    fn from(record: MergedRecord) -> Self {
        Self {
            date: record.instant,
            true_value: record.actual,
            rte_forecast: record.external_forecast,
            our_forecast: record.internal_forecast,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampStatus {
    pub count: u64,
    pub last_timestamp: Option<Instant>,
}

impl From<SourceStatus> for TimestampStatus {
    fn from(status: SourceStatus) -> Self {
        Self {
            count: status.count,
            last_timestamp: status.most_recent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedStatus {
    pub count: u64,
    pub last_generated: Option<Instant>,
}

impl From<SourceStatus> for GeneratedStatus {
    fn from(status: SourceStatus) -> Self {
        Self {
            count: status.count,
            last_generated: status.most_recent,
        }
    }
}

/// Response of `/api/status`, keyed by table name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub historical_data: TimestampStatus,
    pub predictions: GeneratedStatus,
    pub rte_forecasts: TimestampStatus,
}

impl From<StatusReport> for StatusResponse {
    fn from(report: StatusReport) -> Self {
        Self {
            historical_data: report.actual.into(),
            predictions: report.internal_forecast.into(),
            rte_forecasts: report.external_forecast.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Instant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthResponse {
    pub fn ok(timestamp: Instant) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Some(timestamp),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            timestamp: None,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_combined_point_serializes_nulls() {
        let mut record = MergedRecord::empty(Instant::from_micros(0));
        record.actual = Some(51_000.0);
        let value = serde_json::to_value(CombinedPoint::from(record)).unwrap();
        assert_eq!(
            value,
            json!({
                "date": "1970-01-01T00:00:00Z",
                "true_value": 51000.0,
                "rte_forecast": null,
                "our_forecast": null
            })
        );
    }

    #[test]
    fn test_blank_model_means_no_filter() {
        let query = SeriesQuery {
            model: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(query.read_filter(), ReadFilter::default());
    }
}
