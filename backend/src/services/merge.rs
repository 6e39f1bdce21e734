//! Full outer join of source series on canonical instants.

use std::collections::{BTreeMap, BTreeSet};

use super::error::SeriesError;
use crate::models::{DuplicateInstant, Instant, MergedRecord, SourceSeries};

/// Merge up to one series per source into records ordered by instant.
///
/// The output holds exactly one record per instant in the union of the inputs,
/// with a value for every source that has a point there and `None` elsewhere.
/// Values are placed by source kind, so argument order does not affect the result.
/// No window filtering happens here.
pub fn merge_series<I>(series: I) -> Result<Vec<MergedRecord>, SeriesError>
where
    I: IntoIterator<Item = SourceSeries>,
{
    let mut seen = BTreeSet::new();
    let mut rows: BTreeMap<Instant, MergedRecord> = BTreeMap::new();

    for source in series {
        let kind = source.kind();
        if !seen.insert(kind) {
            return Err(SeriesError::DuplicateSource(kind));
        }
        for point in source.into_points() {
            let record = rows
                .entry(point.instant)
                .or_insert_with(|| MergedRecord::empty(point.instant));
            if record.value(kind).is_some() {
                return Err(DuplicateInstant {
                    kind,
                    instant: point.instant,
                }
                .into());
            }
            record.set(kind, point.value);
        }
    }

    Ok(rows.into_values().collect())
}
