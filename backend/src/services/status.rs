//! Per-source counts and freshness.

use serde::Serialize;

use crate::db::repository::{SeriesRepository, StatusRepository};
use crate::models::{Instant, SourceKind};

use super::error::SeriesError;
use super::normalize::TimeKeyNormalizer;

/// Row count and most recent instant of one source.
///
/// For internal forecasts `most_recent` is the latest generation instant, not the
/// latest target instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceStatus {
    pub source: SourceKind,
    pub count: u64,
    pub most_recent: Option<Instant>,
}

/// Status of all three sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub actual: SourceStatus,
    pub external_forecast: SourceStatus,
    pub internal_forecast: SourceStatus,
}

/// Aggregate count and freshness of one source.
pub async fn source_status<R>(repo: &R, kind: SourceKind) -> Result<SourceStatus, SeriesError>
where
    R: SeriesRepository + StatusRepository + ?Sized,
{
    let stats = repo
        .source_stats(kind)
        .await
        .map_err(|e| SeriesError::source_read(kind, e))?;

    let normalizer = TimeKeyNormalizer::new(repo.timestamp_storage(kind));
    let most_recent = stats
        .latest
        .as_ref()
        .map(|raw| normalizer.normalize(raw))
        .transpose()
        .map_err(|error| SeriesError::Normalization { kind, error })?;

    Ok(SourceStatus {
        source: kind,
        count: u64::try_from(stats.count).unwrap_or(0),
        most_recent,
    })
}

/// Status of every source, aggregated concurrently.
pub async fn aggregate_status<R>(repo: &R) -> Result<StatusReport, SeriesError>
where
    R: SeriesRepository + StatusRepository + ?Sized,
{
    let (actual, external_forecast, internal_forecast) = tokio::try_join!(
        source_status(repo, SourceKind::Actual),
        source_status(repo, SourceKind::ExternalForecast),
        source_status(repo, SourceKind::InternalForecast),
    )?;

    Ok(StatusReport {
        actual,
        external_forecast,
        internal_forecast,
    })
}
