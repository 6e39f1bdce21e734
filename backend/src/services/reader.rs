//! Source reads and the merged read path.

use crate::db::models::ReadFilter;
use crate::db::repository::SeriesRepository;
use crate::models::{MergedRecord, SourceKind, SourceSeries, Window};

use super::error::SeriesError;
use super::merge::merge_series;
use super::normalize::{normalize_rows, DuplicatePolicy, TimeKeyNormalizer};
use super::options::SeriesOptions;

/// Reads one source over a window and hands back a canonical series.
///
/// The repository may return rows slightly outside the window (naive sources are
/// queried with widened bounds); the reader re-filters on normalized instants.
pub struct SourceReader<'a, R: ?Sized> {
    repo: &'a R,
    kind: SourceKind,
}

impl<'a, R> SourceReader<'a, R>
where
    R: SeriesRepository + ?Sized,
{
    pub fn new(repo: &'a R, kind: SourceKind) -> Self {
        Self { repo, kind }
    }

    pub async fn read(
        &self,
        window: &Window,
        filter: &ReadFilter,
        policy: DuplicatePolicy,
    ) -> Result<SourceSeries, SeriesError> {
        let rows = self
            .repo
            .fetch_rows(self.kind, window, filter)
            .await
            .map_err(|e| SeriesError::source_read(self.kind, e))?;
        let fetched = rows.len();

        let normalizer = TimeKeyNormalizer::new(self.repo.timestamp_storage(self.kind));
        let series = normalize_rows(self.kind, rows, &normalizer, window, policy)?;

        log::debug!(
            "read {}: {} rows fetched, {} points in window",
            self.kind,
            fetched,
            series.len()
        );
        Ok(series)
    }
}

/// Read a single source. Failures are never degraded on this path.
pub async fn read_source<R>(
    repo: &R,
    kind: SourceKind,
    window: &Window,
    filter: &ReadFilter,
    policy: DuplicatePolicy,
) -> Result<SourceSeries, SeriesError>
where
    R: SeriesRepository + ?Sized,
{
    SourceReader::new(repo, kind).read(window, filter, policy).await
}

/// Merged records plus the sources that were treated as empty after failing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergedSeries {
    pub records: Vec<MergedRecord>,
    pub degraded: Vec<SourceKind>,
}

impl MergedSeries {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Read all three sources concurrently and merge them on the instant key.
///
/// With `degrade_on_source_failure`, a source whose store read fails contributes
/// an empty series and is listed in [`MergedSeries::degraded`]. If every source
/// fails the first failure is returned.
pub async fn read_merged<R>(
    repo: &R,
    window: &Window,
    filter: &ReadFilter,
    options: &SeriesOptions,
) -> Result<MergedSeries, SeriesError>
where
    R: SeriesRepository + ?Sized,
{
    let policy = options.duplicate_policy;
    let (actual, external, internal) = tokio::join!(
        read_source(repo, SourceKind::Actual, window, filter, policy),
        read_source(repo, SourceKind::ExternalForecast, window, filter, policy),
        read_source(repo, SourceKind::InternalForecast, window, filter, policy),
    );

    let mut series = Vec::with_capacity(SourceKind::ALL.len());
    let mut degraded = Vec::new();
    let mut first_failure = None;

    for (kind, result) in SourceKind::ALL.into_iter().zip([actual, external, internal]) {
        match result {
            Ok(s) => series.push(s),
            Err(e) if options.degrade_on_source_failure && e.is_degradable() => {
                log::warn!("{} unavailable, merging without it: {}", kind, e);
                degraded.push(kind);
                series.push(SourceSeries::empty(kind));
                first_failure.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }

    if degraded.len() == SourceKind::ALL.len() {
        if let Some(e) = first_failure {
            return Err(e);
        }
    }

    let records = merge_series(series)?;
    log::debug!(
        "merged {} records over [{}, {}]",
        records.len(),
        window.start(),
        window.end()
    );
    Ok(MergedSeries { records, degraded })
}
