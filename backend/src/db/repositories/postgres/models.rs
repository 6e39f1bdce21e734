use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Nullable, Text, Timestamp, Timestamptz};

use crate::db::models::{RawTimestamp, SourceRow, SourceStats};

#[derive(Debug, Clone, QueryableByName)]
pub struct AwareSourceRow {
    #[diesel(sql_type = Timestamptz)]
    pub ts: DateTime<Utc>,
    #[diesel(sql_type = Double)]
    pub value: f64,
    #[diesel(sql_type = Nullable<Text>)]
    pub model: Option<String>,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub generated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, QueryableByName)]
pub struct NaiveSourceRow {
    #[diesel(sql_type = Timestamp)]
    pub ts: NaiveDateTime,
    #[diesel(sql_type = Double)]
    pub value: f64,
    #[diesel(sql_type = Nullable<Text>)]
    pub model: Option<String>,
    #[diesel(sql_type = Nullable<Timestamp>)]
    pub generated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, QueryableByName)]
pub struct AwareStatsRow {
    #[diesel(sql_type = BigInt)]
    pub count: i64,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub latest: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, QueryableByName)]
pub struct NaiveStatsRow {
    #[diesel(sql_type = BigInt)]
    pub count: i64,
    #[diesel(sql_type = Nullable<Timestamp>)]
    pub latest: Option<NaiveDateTime>,
}

impl From<AwareSourceRow> for SourceRow {
    fn from(row: AwareSourceRow) -> Self {
        SourceRow {
            timestamp: row.ts.into(),
            value: row.value,
            model: row.model,
            generated_at: row.generated_at.map(RawTimestamp::from),
        }
    }
}

impl From<NaiveSourceRow> for SourceRow {
    fn from(row: NaiveSourceRow) -> Self {
        SourceRow {
            timestamp: row.ts.into(),
            value: row.value,
            model: row.model,
            generated_at: row.generated_at.map(RawTimestamp::from),
        }
    }
}

impl From<AwareStatsRow> for SourceStats {
    fn from(row: AwareStatsRow) -> Self {
        SourceStats {
            count: row.count,
            latest: row.latest.map(RawTimestamp::from),
        }
    }
}

impl From<NaiveStatsRow> for SourceStats {
    fn from(row: NaiveStatsRow) -> Self {
        SourceStats {
            count: row.count,
            latest: row.latest.map(RawTimestamp::from),
        }
    }
}
