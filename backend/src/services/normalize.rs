//! Timestamp normalization.
//!
//! All timezone interpretation of stored timestamps lives here. Raw values leave
//! this module as canonical [`Instant`]s, which the merge step compares with exact
//! equality.

use chrono::{LocalResult, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::SeriesError;
use crate::db::models::{RawTimestamp, SourceRow, TimestampStorage};
use crate::models::{DuplicateInstant, Instant, SourceKind, SourcePoint, SourceSeries, Window};

/// Extra margin applied to SQL bounds of local-time sources.
const LOCAL_BOUND_MARGIN_DAYS: i64 = 1;

/// A stored timestamp could not be mapped to an instant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationError {
    /// Wall-clock time skipped by a DST transition.
    #[error("local time {local} does not exist in {zone}")]
    NonexistentLocalTime { local: NaiveDateTime, zone: Tz },
}

/// How to treat two rows of one source that normalize to the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with a duplicate-instant error.
    Reject,
    /// Keep the most recently generated row, then the last one read.
    #[default]
    LastWriteWins,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "last_write_wins" | "last-write-wins" | "lww" => Ok(Self::LastWriteWins),
            other => Err(format!("Unknown duplicate policy: {}", other)),
        }
    }
}

/// Maps raw timestamps of one source to canonical instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeKeyNormalizer {
    storage: TimestampStorage,
}

impl TimeKeyNormalizer {
    pub fn new(storage: TimestampStorage) -> Self {
        Self { storage }
    }

    /// Canonical instant for a stored timestamp.
    ///
    /// Aware values are absolute whatever the storage convention says. Naive values
    /// are read as UTC unless the source stores local time, in which case DST-gap
    /// times are rejected and fall-back times resolve to the earlier instant.
    pub fn normalize(&self, raw: &RawTimestamp) -> Result<Instant, NormalizationError> {
        match raw {
            RawTimestamp::Aware(dt) => Ok(Instant::from_datetime(dt)),
            RawTimestamp::Naive(naive) => match self.storage {
                TimestampStorage::Aware | TimestampStorage::NaiveUtc => {
                    Ok(Instant::from_datetime(&Utc.from_utc_datetime(naive)))
                }
                TimestampStorage::NaiveLocal(zone) => match zone.from_local_datetime(naive) {
                    LocalResult::Single(dt) => Ok(Instant::from_datetime(&dt)),
                    LocalResult::Ambiguous(earliest, _) => Ok(Instant::from_datetime(&earliest)),
                    LocalResult::None => Err(NormalizationError::NonexistentLocalTime {
                        local: *naive,
                        zone,
                    }),
                },
            },
        }
    }

    /// Instant of `raw` when it lies inside `window`, `None` when it lies outside.
    ///
    /// A local time skipped by DST has no instant. It is only an error when its
    /// wall-clock value falls between the window's local bounds.
    pub fn normalize_within(
        &self,
        raw: &RawTimestamp,
        window: &Window,
    ) -> Result<Option<Instant>, NormalizationError> {
        match self.normalize(raw) {
            Ok(instant) => Ok(window.contains(instant).then_some(instant)),
            Err(NormalizationError::NonexistentLocalTime { local, zone }) => {
                let start = window.start().to_datetime().with_timezone(&zone).naive_local();
                let end = window.end().to_datetime().with_timezone(&zone).naive_local();
                if local < start || local > end {
                    Ok(None)
                } else {
                    Err(NormalizationError::NonexistentLocalTime { local, zone })
                }
            }
        }
    }

    /// Naive SQL bounds covering `window` for sources that store naive timestamps.
    ///
    /// Returns `None` for aware storage, where the window bounds bind directly.
    /// Local-time bounds are widened so that no row inside the window is missed
    /// around DST transitions.
    pub fn naive_query_bounds(&self, window: &Window) -> Option<(NaiveDateTime, NaiveDateTime)> {
        match self.storage {
            TimestampStorage::Aware => None,
            TimestampStorage::NaiveUtc => Some((
                window.start().to_datetime().naive_utc(),
                window.end().to_datetime().naive_utc(),
            )),
            TimestampStorage::NaiveLocal(zone) => {
                let margin = TimeDelta::days(LOCAL_BOUND_MARGIN_DAYS);
                let start = window.start().to_datetime().with_timezone(&zone).naive_local();
                let end = window.end().to_datetime().with_timezone(&zone).naive_local();
                Some((
                    start.checked_sub_signed(margin).unwrap_or(start),
                    end.checked_add_signed(margin).unwrap_or(end),
                ))
            }
        }
    }
}

/// Turn raw rows of one source into a window-bounded, duplicate-free series.
///
/// Rows are ordered by (instant, generation instant, read order) before the
/// duplicate policy is applied, so "last write" means the most recently generated
/// forecast.
pub fn normalize_rows(
    source: SourceKind,
    rows: Vec<SourceRow>,
    normalizer: &TimeKeyNormalizer,
    window: &Window,
    policy: DuplicatePolicy,
) -> Result<SourceSeries, SeriesError> {
    let mut keyed = Vec::with_capacity(rows.len());
    for (seq, row) in rows.into_iter().enumerate() {
        let instant = match normalizer
            .normalize_within(&row.timestamp, window)
            .map_err(|error| SeriesError::Normalization { kind: source, error })?
        {
            Some(instant) => instant,
            None => continue,
        };
        let generated = row
            .generated_at
            .as_ref()
            .map(|raw| normalizer.normalize(raw))
            .transpose()
            .map_err(|error| SeriesError::Normalization { kind: source, error })?;
        let mut point = SourcePoint::new(instant, row.value);
        point.model = row.model;
        keyed.push((instant, generated, seq, point));
    }

    keyed.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));

    let mut points: Vec<SourcePoint> = Vec::with_capacity(keyed.len());
    let mut replaced = 0usize;
    for (instant, _, _, point) in keyed {
        match points.last_mut() {
            Some(last) if last.instant == instant => match policy {
                DuplicatePolicy::Reject => {
                    return Err(DuplicateInstant {
                        kind: source,
                        instant,
                    }
                    .into())
                }
                DuplicatePolicy::LastWriteWins => {
                    *last = point;
                    replaced += 1;
                }
            },
            _ => points.push(point),
        }
    }

    if replaced > 0 {
        log::warn!(
            "{} duplicate instant(s) in {} resolved by last write",
            replaced,
            source
        );
    }

    Ok(SourceSeries::new(source, points)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate};
    use chrono_tz::Europe::Paris;

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn utc_instant(y: i32, m: u32, d: u32, h: u32) -> Instant {
        Instant::from_datetime(&Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap())
    }

    fn wide_window() -> Window {
        Window::new(utc_instant(2000, 1, 1, 0), utc_instant(2100, 1, 1, 0)).unwrap()
    }

    #[test]
    fn test_local_and_utc_storage_agree_on_same_moment() {
        let local = TimeKeyNormalizer::new(TimestampStorage::NaiveLocal(Paris));
        let utc = TimeKeyNormalizer::new(TimestampStorage::NaiveUtc);
        let aware = TimeKeyNormalizer::new(TimestampStorage::Aware);

        // Summer time: Paris is UTC+2
        let from_local = local.normalize(&naive(2024, 7, 1, 14, 0).into()).unwrap();
        let from_utc = utc.normalize(&naive(2024, 7, 1, 12, 0).into()).unwrap();
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let from_aware = aware
            .normalize(&offset.with_ymd_and_hms(2024, 7, 1, 14, 0, 0).unwrap().into())
            .unwrap();

        assert_eq!(from_local, from_utc);
        assert_eq!(from_local, from_aware);
        assert_eq!(from_local, utc_instant(2024, 7, 1, 12));
    }

    #[test]
    fn test_aware_values_ignore_storage_convention() {
        let local = TimeKeyNormalizer::new(TimestampStorage::NaiveLocal(Paris));
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        assert_eq!(local.normalize(&dt.into()).unwrap(), Instant::from_datetime(&dt));
    }

    #[test]
    fn test_dst_gap_is_rejected() {
        let local = TimeKeyNormalizer::new(TimestampStorage::NaiveLocal(Paris));
        // 2024-03-31 02:30 does not exist in Paris
        let err = local.normalize(&naive(2024, 3, 31, 2, 30).into()).unwrap_err();
        assert!(matches!(err, NormalizationError::NonexistentLocalTime { .. }));
    }

    #[test]
    fn test_dst_gap_outside_window_is_skipped() {
        let local = TimeKeyNormalizer::new(TimestampStorage::NaiveLocal(Paris));
        let gap: RawTimestamp = naive(2024, 3, 31, 2, 30).into();

        let january = Window::new(utc_instant(2024, 1, 1, 0), utc_instant(2024, 1, 1, 23)).unwrap();
        assert_eq!(local.normalize_within(&gap, &january).unwrap(), None);

        // The widened SQL bounds of this window still reach the gap row
        let eve = Window::new(utc_instant(2024, 3, 30, 0), utc_instant(2024, 3, 30, 22)).unwrap();
        let (_, upper) = local.naive_query_bounds(&eve).unwrap();
        assert!(naive(2024, 3, 31, 2, 30) <= upper);
        assert_eq!(local.normalize_within(&gap, &eve).unwrap(), None);

        let covering = Window::new(utc_instant(2024, 3, 31, 0), utc_instant(2024, 3, 31, 3)).unwrap();
        assert!(matches!(
            local.normalize_within(&gap, &covering),
            Err(NormalizationError::NonexistentLocalTime { .. })
        ));
    }

    #[test]
    fn test_normalize_rows_ignores_gap_row_outside_window() {
        let local = TimeKeyNormalizer::new(TimestampStorage::NaiveLocal(Paris));
        let window = Window::new(utc_instant(2024, 1, 1, 0), utc_instant(2024, 1, 1, 23)).unwrap();
        let rows = vec![
            SourceRow::new(naive(2024, 1, 1, 12, 0), 1.0),
            SourceRow::new(naive(2024, 3, 31, 2, 30), 2.0),
        ];
        let series =
            normalize_rows(SourceKind::Actual, rows, &local, &window, DuplicatePolicy::Reject)
                .unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.points()[0].instant, utc_instant(2024, 1, 1, 11));

        let covering = Window::new(utc_instant(2024, 3, 31, 0), utc_instant(2024, 3, 31, 3)).unwrap();
        let rows = vec![SourceRow::new(naive(2024, 3, 31, 2, 30), 2.0)];
        let err =
            normalize_rows(SourceKind::Actual, rows, &local, &covering, DuplicatePolicy::Reject)
                .unwrap_err();
        assert!(matches!(err, SeriesError::Normalization { .. }));
    }

    #[test]
    fn test_dst_fall_back_resolves_to_earliest() {
        let local = TimeKeyNormalizer::new(TimestampStorage::NaiveLocal(Paris));
        // 2024-10-27 02:30 happens twice; the first is 00:30 UTC
        let instant = local.normalize(&naive(2024, 10, 27, 2, 30).into()).unwrap();
        assert_eq!(
            instant,
            Instant::from_datetime(&Utc.with_ymd_and_hms(2024, 10, 27, 0, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_naive_query_bounds() {
        let window = Window::new(utc_instant(2024, 7, 1, 0), utc_instant(2024, 7, 2, 0)).unwrap();
        assert!(TimeKeyNormalizer::new(TimestampStorage::Aware)
            .naive_query_bounds(&window)
            .is_none());

        let (start, end) = TimeKeyNormalizer::new(TimestampStorage::NaiveUtc)
            .naive_query_bounds(&window)
            .unwrap();
        assert_eq!(start, naive(2024, 7, 1, 0, 0));
        assert_eq!(end, naive(2024, 7, 2, 0, 0));

        let (start, end) = TimeKeyNormalizer::new(TimestampStorage::NaiveLocal(Paris))
            .naive_query_bounds(&window)
            .unwrap();
        assert_eq!(start, naive(2024, 6, 30, 2, 0));
        assert_eq!(end, naive(2024, 7, 3, 2, 0));
    }

    #[test]
    fn test_normalize_rows_filters_sorts_and_keeps_models() {
        let normalizer = TimeKeyNormalizer::new(TimestampStorage::NaiveUtc);
        let window = Window::new(utc_instant(2024, 7, 1, 0), utc_instant(2024, 7, 1, 2)).unwrap();
        let rows = vec![
            SourceRow::new(naive(2024, 7, 1, 2, 0), 3.0).with_model("m"),
            SourceRow::new(naive(2024, 7, 1, 0, 0), 1.0).with_model("m"),
            SourceRow::new(naive(2024, 7, 1, 5, 0), 9.0).with_model("m"),
        ];
        let series = normalize_rows(
            SourceKind::InternalForecast,
            rows,
            &normalizer,
            &window,
            DuplicatePolicy::Reject,
        )
        .unwrap();

        let values: Vec<_> = series.points().iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 3.0]);
        assert_eq!(series.points()[0].model.as_deref(), Some("m"));
    }

    #[test]
    fn test_duplicates_rejected_under_reject_policy() {
        let normalizer = TimeKeyNormalizer::new(TimestampStorage::Aware);
        let t = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let rows = vec![SourceRow::new(t, 1.0), SourceRow::new(t, 2.0)];
        let err = normalize_rows(
            SourceKind::Actual,
            rows,
            &normalizer,
            &wide_window(),
            DuplicatePolicy::Reject,
        )
        .unwrap_err();
        assert!(matches!(err, SeriesError::DuplicateInstant(_)));
    }

    #[test]
    fn test_last_write_wins_prefers_latest_generation() {
        let normalizer = TimeKeyNormalizer::new(TimestampStorage::Aware);
        let target = Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2024, 7, 1, 6, 0, 0).unwrap();
        let rows = vec![
            SourceRow::new(target, 2.0).with_model("b").generated_at(newer),
            SourceRow::new(target, 1.0).with_model("a").generated_at(older),
        ];
        let series = normalize_rows(
            SourceKind::InternalForecast,
            rows,
            &normalizer,
            &wide_window(),
            DuplicatePolicy::LastWriteWins,
        )
        .unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.points()[0].value, 2.0);
        assert_eq!(series.points()[0].model.as_deref(), Some("b"));
    }

    #[test]
    fn test_mixed_conventions_collapse_to_one_key() {
        // A naive local row and an aware row for the same moment
        let local = TimeKeyNormalizer::new(TimestampStorage::NaiveLocal(Paris));
        let rows = vec![
            SourceRow::new(naive(2024, 1, 10, 13, 0), 1.0),
            SourceRow::new(Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap(), 2.0),
        ];
        let series = normalize_rows(
            SourceKind::Actual,
            rows,
            &local,
            &wide_window(),
            DuplicatePolicy::LastWriteWins,
        )
        .unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_duplicate_policy_parse() {
        assert_eq!("reject".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Reject);
        assert_eq!("LWW".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::LastWriteWins);
        assert!("first".parse::<DuplicatePolicy>().is_err());
    }
}
