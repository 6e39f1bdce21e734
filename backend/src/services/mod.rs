//! Service layer for the series data path.
//!
//! Services sit between the repositories and the HTTP layer: they resolve request
//! windows, read and normalize each source, merge the results and aggregate status.

pub mod error;
pub mod merge;
pub mod normalize;
pub mod options;
pub mod range;
pub mod reader;
pub mod status;

pub use error::SeriesError;
pub use merge::merge_series;
pub use normalize::{normalize_rows, DuplicatePolicy, NormalizationError, TimeKeyNormalizer};
pub use options::SeriesOptions;
pub use range::{resolve_window, RangeError, RangeQuery, RangeToken};
pub use reader::{read_merged, read_source, MergedSeries, SourceReader};
pub use status::{aggregate_status, source_status, SourceStatus, StatusReport};
