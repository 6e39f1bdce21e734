//! Property tests of the merge engine.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{FixedOffset, TimeZone, Utc};
use proptest::prelude::*;

use loadwatch::db::models::{SourceRow, TimestampStorage};
use loadwatch::models::{Instant, MergedRecord, SourceKind, SourcePoint, SourceSeries, Window};
use loadwatch::services::{merge_series, normalize_rows, DuplicatePolicy, TimeKeyNormalizer};

const HOUR_MICROS: i64 = 3_600_000_000;
// 2024-01-01T00:00:00Z
const BASE_MICROS: i64 = 1_704_067_200_000_000;

fn at(hour: i64) -> Instant {
    Instant::from_micros(BASE_MICROS + hour * HOUR_MICROS)
}

/// Hour offsets to values, one per instant.
fn source_map() -> impl Strategy<Value = BTreeMap<i64, f64>> {
    prop::collection::btree_map(0i64..500, -1.0e5f64..1.0e5, 0..60)
}

fn to_series(kind: SourceKind, map: &BTreeMap<i64, f64>) -> SourceSeries {
    SourceSeries::new(
        kind,
        map.iter().map(|(h, v)| SourcePoint::new(at(*h), *v)).collect(),
    )
    .unwrap()
}

fn merged(
    actual: &BTreeMap<i64, f64>,
    external: &BTreeMap<i64, f64>,
    internal: &BTreeMap<i64, f64>,
) -> Vec<MergedRecord> {
    merge_series([
        to_series(SourceKind::Actual, actual),
        to_series(SourceKind::ExternalForecast, external),
        to_series(SourceKind::InternalForecast, internal),
    ])
    .unwrap()
}

proptest! {
    #[test]
    fn union_completeness(a in source_map(), e in source_map(), i in source_map()) {
        let records = merged(&a, &e, &i);
        let expected: BTreeSet<Instant> = a.keys().chain(e.keys()).chain(i.keys()).map(|h| at(*h)).collect();
        let got: BTreeSet<Instant> = records.iter().map(|r| r.instant).collect();
        prop_assert_eq!(got, expected.clone());
        prop_assert_eq!(records.len(), expected.len());
    }

    #[test]
    fn null_correctness(a in source_map(), e in source_map(), i in source_map()) {
        for record in merged(&a, &e, &i) {
            let hour = (record.instant.as_micros() - BASE_MICROS) / HOUR_MICROS;
            prop_assert_eq!(record.actual, a.get(&hour).copied());
            prop_assert_eq!(record.external_forecast, e.get(&hour).copied());
            prop_assert_eq!(record.internal_forecast, i.get(&hour).copied());
            prop_assert!(!record.is_empty());
        }
    }

    #[test]
    fn strictly_ascending(a in source_map(), e in source_map(), i in source_map()) {
        let records = merged(&a, &e, &i);
        prop_assert!(records.windows(2).all(|w| w[0].instant < w[1].instant));
    }

    #[test]
    fn deterministic_and_order_independent(a in source_map(), e in source_map(), i in source_map()) {
        let first = merged(&a, &e, &i);
        let again = merged(&a, &e, &i);
        let reversed = merge_series([
            to_series(SourceKind::InternalForecast, &i),
            to_series(SourceKind::Actual, &a),
            to_series(SourceKind::ExternalForecast, &e),
        ])
        .unwrap();
        prop_assert_eq!(&first, &again);
        prop_assert_eq!(&first, &reversed);
    }

    #[test]
    fn timezone_invariance(hours in prop::collection::btree_set(0i64..500, 1..40), offset_h in -12i32..=14) {
        let offset = FixedOffset::east_opt(offset_h * 3600).unwrap();
        let window = Window::new(at(0), at(500)).unwrap();
        let normalizer = TimeKeyNormalizer::new(TimestampStorage::Aware);

        let rows = |shifted: bool| -> Vec<SourceRow> {
            hours
                .iter()
                .map(|h| {
                    let utc = Utc.timestamp_micros(BASE_MICROS + h * HOUR_MICROS).unwrap();
                    if shifted {
                        SourceRow::new(utc.with_timezone(&offset), *h as f64)
                    } else {
                        SourceRow::new(utc, *h as f64)
                    }
                })
                .collect()
        };

        let utc_series = normalize_rows(SourceKind::Actual, rows(false), &normalizer, &window, DuplicatePolicy::Reject).unwrap();
        let shifted_series = normalize_rows(SourceKind::Actual, rows(true), &normalizer, &window, DuplicatePolicy::Reject).unwrap();

        let utc_merged = merge_series([utc_series]).unwrap();
        let shifted_merged = merge_series([shifted_series]).unwrap();
        prop_assert_eq!(utc_merged, shifted_merged);
    }

    #[test]
    fn window_containment(hours in prop::collection::btree_set(-50i64..550, 0..80), lo in 0i64..250, len in 0i64..250) {
        let window = Window::new(at(lo), at(lo + len)).unwrap();
        let normalizer = TimeKeyNormalizer::new(TimestampStorage::NaiveUtc);
        let rows: Vec<SourceRow> = hours
            .iter()
            .map(|h| SourceRow::new(at(*h).to_datetime().naive_utc(), 1.0))
            .collect();

        let series = normalize_rows(SourceKind::ExternalForecast, rows, &normalizer, &window, DuplicatePolicy::Reject).unwrap();
        let expected = hours.iter().filter(|h| **h >= lo && **h <= lo + len).count();
        prop_assert_eq!(series.len(), expected);
        prop_assert!(series.points().iter().all(|p| window.contains(p.instant)));
    }
}
