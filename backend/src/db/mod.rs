//! Storage access for the three series sources.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  HTTP layer (handlers)                                  │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Services - window resolution, normalization, merge     │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository traits (repository/)                        │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴──────────────┐
//!     │  Postgres          Local     │
//!     │  (diesel/r2d2)     (memory)  │
//!     └──────────────────────────────┘
//! ```
//!
//! - `repository`: trait definitions and the error type
//! - `repositories::postgres`: Postgres implementation with Diesel
//! - `repositories::local`: in-memory implementation for tests and local runs
//! - `factory` / `repo_config`: building a repository from `repository.toml` or
//!   the environment
//!
//! There is no process-wide repository; callers build one and pass it along.

#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod models;
pub mod repo_config;
pub mod repositories;
pub mod repository;

// Postgres config is colocated with the repository implementation.
#[cfg(feature = "postgres-repo")]
pub use repositories::postgres::{PoolStats, PostgresConfig};

/// Placeholder so configuration code compiles without the Postgres backend.
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone, Default)]
pub struct PostgresConfig {
    _private: (),
}

#[cfg(not(feature = "postgres-repo"))]
impl PostgresConfig {
    pub fn from_env() -> Result<Self, String> {
        Err("Postgres repository feature not enabled".to_string())
    }
}

pub use factory::{RepositoryFactory, RepositoryType};
pub use models::{RawTimestamp, ReadFilter, SourceRow, SourceStats, SourceStorage, TimestampStorage};
pub use repo_config::RepositoryConfig;
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    ErrorContext, FullRepository, RepositoryError, RepositoryResult, SeriesRepository,
    StatusRepository,
};
