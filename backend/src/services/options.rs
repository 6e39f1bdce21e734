//! Data-path behaviour switches.

use serde::{Deserialize, Serialize};

use super::normalize::DuplicatePolicy;

/// Options applied to every series request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesOptions {
    /// How to resolve two rows of one source at the same instant
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// Treat a failing source as empty on the merged path instead of failing
    #[serde(default = "default_true")]
    pub degrade_on_source_failure: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SeriesOptions {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::default(),
            degrade_on_source_failure: true,
        }
    }
}

impl SeriesOptions {
    /// Read options from environment variables.
    ///
    /// # Environment Variables
    /// - `SERIES_DUPLICATE_POLICY`: `reject` | `last_write_wins` (default: last_write_wins)
    /// - `SERIES_DEGRADE`: `true` | `false` (default: true)
    pub fn from_env() -> Result<Self, String> {
        let mut options = Self::default();

        if let Ok(value) = std::env::var("SERIES_DUPLICATE_POLICY") {
            options.duplicate_policy = value.parse()?;
        }

        if let Ok(value) = std::env::var("SERIES_DEGRADE") {
            options.degrade_on_source_failure = value
                .trim()
                .parse()
                .map_err(|_| format!("SERIES_DEGRADE must be true or false, got {:?}", value))?;
        }

        Ok(options)
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_degrade(mut self, degrade: bool) -> Self {
        self.degrade_on_source_failure = degrade;
        self
    }
}
