//! Windowed reads of a single source.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::db::models::{ReadFilter, SourceRow, TimestampStorage};
use crate::models::{SourceKind, Window};

/// Repository trait for reading source rows.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait SeriesRepository: Send + Sync {
    /// How `source` stores its timestamps.
    fn timestamp_storage(&self, source: SourceKind) -> TimestampStorage;

    /// Fetch the rows of `source` that may fall within `window`.
    ///
    /// Implementations must return every row inside the window. Sources with naive
    /// timestamps may also return rows just outside it; callers filter again after
    /// normalization. Rows come back ordered by stored timestamp and, for forecasts,
    /// by generation time.
    ///
    /// # Arguments
    /// * `source` - Which source to read
    /// * `window` - Inclusive instant range
    /// * `filter` - Additional row constraints (e.g. a single forecast model)
    async fn fetch_rows(
        &self,
        source: SourceKind,
        window: &Window,
        filter: &ReadFilter,
    ) -> RepositoryResult<Vec<SourceRow>>;
}
