//! Core data model of the merge engine.
//!
//! Everything here is request-scoped and timezone-agnostic: instants are absolute,
//! and display-timezone conversion only happens at the presentation boundary.

pub mod instant;
pub mod series;

pub use instant::Instant;
pub use series::{DuplicateInstant, MergedRecord, SourceKind, SourcePoint, SourceSeries, Window};
