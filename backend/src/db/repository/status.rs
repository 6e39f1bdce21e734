//! Liveness and aggregate queries used by the diagnostic endpoints.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::db::models::SourceStats;
use crate::models::SourceKind;

/// Repository trait for health and freshness reporting.
#[async_trait]
pub trait StatusRepository: Send + Sync {
    /// Check if the store is reachable.
    ///
    /// # Returns
    /// - `Ok(true)` if connection is healthy
    /// - `Ok(false)` if connection is unhealthy but no error occurred
    /// - `Err(RepositoryError)` if an error occurred during the check
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Row count and latest timestamp of `source`.
    ///
    /// For internal forecasts the latest timestamp is the generation time, not the
    /// forecast target.
    async fn source_stats(&self, source: SourceKind) -> RepositoryResult<SourceStats>;
}
