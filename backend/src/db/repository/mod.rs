//! Repository trait definitions for load-series storage.
//!
//! Responsibilities are split across two focused traits:
//!
//! - [`SeriesRepository`]: windowed reads of one source
//! - [`StatusRepository`]: liveness and per-source aggregates
//!
//! Use the [`FullRepository`] bound when a caller needs both.

pub mod error;
pub mod series;
pub mod status;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};
pub use series::SeriesRepository;
pub use status::StatusRepository;

/// Composite trait bound for a complete repository implementation.
pub trait FullRepository: SeriesRepository + StatusRepository {}

// Blanket implementation: anything implementing both traits is a FullRepository
impl<T> FullRepository for T where T: SeriesRepository + StatusRepository {}
