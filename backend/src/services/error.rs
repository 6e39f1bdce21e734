//! Errors of the series data path.

use super::normalize::NormalizationError;
use super::range::RangeError;
use crate::db::repository::RepositoryError;
use crate::models::{DuplicateInstant, SourceKind};

/// Failure while resolving, reading, normalizing or merging series.
#[derive(Debug, thiserror::Error)]
pub enum SeriesError {
    /// Request parameters do not describe a valid window.
    #[error(transparent)]
    Range(#[from] RangeError),

    /// The store failed while reading one source.
    #[error("failed to read {kind}: {error}")]
    SourceRead {
        kind: SourceKind,
        #[source]
        error: RepositoryError,
    },

    /// A stored timestamp has no canonical instant.
    #[error("cannot normalize a timestamp of {kind}: {error}")]
    Normalization {
        kind: SourceKind,
        #[source]
        error: NormalizationError,
    },

    /// One source yielded two points for the same instant.
    #[error(transparent)]
    DuplicateInstant(#[from] DuplicateInstant),

    /// The same source was handed to the merger twice.
    #[error("source {0} supplied more than once")]
    DuplicateSource(SourceKind),
}

impl SeriesError {
    pub fn source_read(kind: SourceKind, error: RepositoryError) -> Self {
        SeriesError::SourceRead {
            kind,
            error: error.with_source(kind),
        }
    }

    /// Whether the caller sent bad parameters (as opposed to a storage failure).
    pub fn is_validation(&self) -> bool {
        matches!(self, SeriesError::Range(_))
    }

    /// Whether this failure may be absorbed by treating the source as empty.
    pub fn is_degradable(&self) -> bool {
        matches!(self, SeriesError::SourceRead { .. })
    }
}
