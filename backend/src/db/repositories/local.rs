//! In-memory local repository implementation.
//!
//! This module provides a local implementation of the repository traits suitable
//! for unit testing and local development. All data is stored in memory, providing
//! fast, deterministic, and isolated execution.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use crate::db::models::{
    RawTimestamp, ReadFilter, SourceRow, SourceStats, SourceStorage, TimestampStorage,
};
use crate::db::repository::{
    ErrorContext, RepositoryError, RepositoryResult, SeriesRepository, StatusRepository,
};
use crate::models::{Instant, SourceKind, Window};
use crate::services::normalize::TimeKeyNormalizer;

/// In-memory local repository.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use loadwatch::db::models::SourceRow;
/// use loadwatch::db::repositories::LocalRepository;
/// use loadwatch::models::SourceKind;
///
/// let repo = LocalRepository::new();
/// let t = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
/// repo.insert_rows(SourceKind::Actual, vec![SourceRow::new(t, 51_200.0)]);
/// assert_eq!(repo.row_count(SourceKind::Actual), 1);
/// ```
#[derive(Clone, Default)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    rows: HashMap<SourceKind, Vec<SourceRow>>,
    storage: SourceStorage,
    failing_sources: HashSet<SourceKind>,
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            storage: SourceStorage::default(),
            failing_sources: HashSet::new(),
            is_healthy: true,
        }
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty repository with the given storage conventions.
    pub fn with_storage(storage: SourceStorage) -> Self {
        let repo = Self::new();
        repo.write().storage = storage;
        repo
    }

    fn read(&self) -> RwLockReadGuard<'_, LocalData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, LocalData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append rows to a source, preserving insertion order.
    pub fn insert_rows(&self, source: SourceKind, rows: impl IntoIterator<Item = SourceRow>) {
        self.write().rows.entry(source).or_default().extend(rows);
    }

    /// Change how a source's timestamps are interpreted.
    pub fn set_timestamp_storage(&self, source: SourceKind, storage: TimestampStorage) {
        self.write().storage.set(source, storage);
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.write().is_healthy = healthy;
    }

    /// Make every read of `source` fail, for testing degraded merges.
    pub fn set_source_failing(&self, source: SourceKind, failing: bool) {
        let mut data = self.write();
        if failing {
            data.failing_sources.insert(source);
        } else {
            data.failing_sources.remove(&source);
        }
    }

    /// Remove all rows, keeping storage conventions and health flags.
    pub fn clear(&self) {
        self.write().rows.clear();
    }

    /// Number of rows stored for a source.
    pub fn row_count(&self, source: SourceKind) -> usize {
        self.read().rows.get(&source).map_or(0, Vec::len)
    }

    fn check_available(data: &LocalData, source: SourceKind, operation: &str) -> RepositoryResult<()> {
        if !data.is_healthy || data.failing_sources.contains(&source) {
            return Err(RepositoryError::connection_with_context(
                "local repository marked unavailable",
                ErrorContext::new(operation).with_source(source),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SeriesRepository for LocalRepository {
    fn timestamp_storage(&self, source: SourceKind) -> TimestampStorage {
        self.read().storage.get(source)
    }

    async fn fetch_rows(
        &self,
        source: SourceKind,
        window: &Window,
        filter: &ReadFilter,
    ) -> RepositoryResult<Vec<SourceRow>> {
        let data = self.read();
        Self::check_available(&data, source, "fetch_rows")?;

        let normalizer = TimeKeyNormalizer::new(data.storage.get(source));
        let model = filter.model_for(source);

        // Gap times inside the window are passed through so the reader reports them
        Ok(data
            .rows
            .get(&source)
            .map(|rows| {
                rows.iter()
                    .filter(|row| model.is_none() || row.model.as_deref() == model)
                    .filter(|row| {
                        normalizer
                            .normalize_within(&row.timestamp, window)
                            .map_or(true, |instant| instant.is_some())
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl StatusRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.read().is_healthy)
    }

    async fn source_stats(&self, source: SourceKind) -> RepositoryResult<SourceStats> {
        let data = self.read();
        Self::check_available(&data, source, "source_stats")?;

        let normalizer = TimeKeyNormalizer::new(data.storage.get(source));
        let rows = data.rows.get(&source).map(Vec::as_slice).unwrap_or_default();

        let freshness = |row: &SourceRow| -> Option<RawTimestamp> {
            match source {
                SourceKind::InternalForecast => row.generated_at,
                _ => Some(row.timestamp),
            }
        };

        let latest = rows
            .iter()
            .filter_map(freshness)
            .filter_map(|raw| normalizer.normalize(&raw).ok().map(|i: Instant| (i, raw)))
            .max_by_key(|(instant, _)| *instant)
            .map(|(_, raw)| raw);

        Ok(SourceStats {
            count: rows.len() as i64,
            latest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn window() -> Window {
        Window::new(
            Instant::from(Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()),
            Instant::from(Utc.with_ymd_and_hms(2024, 7, 1, 23, 0, 0).unwrap()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_rows_respects_window() {
        let repo = LocalRepository::new();
        repo.insert_rows(
            SourceKind::Actual,
            vec![
                SourceRow::new(Utc.with_ymd_and_hms(2024, 6, 30, 23, 0, 0).unwrap(), 1.0),
                SourceRow::new(Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap(), 2.0),
                SourceRow::new(Utc.with_ymd_and_hms(2024, 7, 1, 23, 0, 0).unwrap(), 3.0),
                SourceRow::new(Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap(), 4.0),
            ],
        );

        let rows = repo
            .fetch_rows(SourceKind::Actual, &window(), &ReadFilter::default())
            .await
            .unwrap();
        let values: Vec<_> = rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_fetch_rows_applies_model_filter_to_internal_only() {
        let repo = LocalRepository::new();
        let t = Utc.with_ymd_and_hms(2024, 7, 1, 6, 0, 0).unwrap();
        repo.insert_rows(
            SourceKind::InternalForecast,
            vec![
                SourceRow::new(t, 1.0).with_model("a"),
                SourceRow::new(t, 2.0).with_model("b"),
            ],
        );
        repo.insert_rows(SourceKind::Actual, vec![SourceRow::new(t, 3.0)]);

        let filter = ReadFilter::model("b");
        let internal = repo
            .fetch_rows(SourceKind::InternalForecast, &window(), &filter)
            .await
            .unwrap();
        assert_eq!(internal.len(), 1);
        assert_eq!(internal[0].value, 2.0);

        let actual = repo.fetch_rows(SourceKind::Actual, &window(), &filter).await.unwrap();
        assert_eq!(actual.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_source_returns_connection_error() {
        let repo = LocalRepository::new();
        repo.set_source_failing(SourceKind::ExternalForecast, true);
        let err = repo
            .fetch_rows(SourceKind::ExternalForecast, &window(), &ReadFilter::default())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.context().source, Some(SourceKind::ExternalForecast));

        repo.set_source_failing(SourceKind::ExternalForecast, false);
        assert!(repo
            .fetch_rows(SourceKind::ExternalForecast, &window(), &ReadFilter::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_stats_use_generation_time_for_internal_forecasts() {
        let repo = LocalRepository::new();
        let generated = Utc.with_ymd_and_hms(2024, 6, 30, 18, 0, 0).unwrap();
        let far_target = Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap();
        repo.insert_rows(
            SourceKind::InternalForecast,
            vec![SourceRow::new(far_target, 1.0).generated_at(generated)],
        );

        let stats = repo.source_stats(SourceKind::InternalForecast).await.unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.latest, Some(RawTimestamp::from(generated)));
    }

    #[tokio::test]
    async fn test_stats_compare_local_timestamps_as_instants() {
        let repo = LocalRepository::new();
        repo.set_timestamp_storage(
            SourceKind::Actual,
            TimestampStorage::NaiveLocal(chrono_tz::Europe::Paris),
        );
        let day = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        repo.insert_rows(
            SourceKind::Actual,
            vec![
                SourceRow::new(day.and_hms_opt(10, 0, 0).unwrap(), 1.0),
                SourceRow::new(day.and_hms_opt(9, 0, 0).unwrap(), 2.0),
            ],
        );

        let stats = repo.source_stats(SourceKind::Actual).await.unwrap();
        assert_eq!(
            stats.latest,
            Some(RawTimestamp::Naive(day.and_hms_opt(10, 0, 0).unwrap()))
        );
    }

    #[tokio::test]
    async fn test_empty_source_stats() {
        let repo = LocalRepository::new();
        let stats = repo.source_stats(SourceKind::Actual).await.unwrap();
        assert_eq!(stats, SourceStats::default());
        assert!(repo.health_check().await.unwrap());
        repo.set_healthy(false);
        assert!(!repo.health_check().await.unwrap());
    }
}
