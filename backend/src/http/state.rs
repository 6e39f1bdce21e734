//! Application state for the HTTP server.

use std::sync::Arc;

use crate::db::repository::FullRepository;
use crate::services::SeriesOptions;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository instance for database operations
    pub repository: Arc<dyn FullRepository>,
    /// Duplicate and degrade behaviour of the data path
    pub options: SeriesOptions,
}

impl AppState {
    /// Create a new application state with default series options.
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self {
            repository,
            options: SeriesOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SeriesOptions) -> Self {
        self.options = options;
        self
    }
}
