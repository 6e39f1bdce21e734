//! Table layout of the three series sources.
//!
//! Reads go through `sql_query` so that one row shape serves both timestamp
//! storage conventions; these descriptors hold the identifiers those queries use.

use crate::models::SourceKind;

/// Columns of one source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceTable {
    pub table: &'static str,
    pub time_column: &'static str,
    pub value_column: &'static str,
    /// Producing model, when the table holds several models
    pub model_column: Option<&'static str>,
    /// Generation instant, used for freshness instead of `time_column`
    pub generated_column: Option<&'static str>,
}

pub const HISTORICAL_DATA: SourceTable = SourceTable {
    table: "historical_data",
    time_column: "timestamp",
    value_column: "value",
    model_column: None,
    generated_column: None,
};

pub const RTE_FORECASTS: SourceTable = SourceTable {
    table: "rte_forecasts",
    time_column: "timestamp",
    value_column: "forecast_value",
    model_column: None,
    generated_column: None,
};

pub const PREDICTIONS: SourceTable = SourceTable {
    table: "predictions",
    time_column: "timestamp",
    value_column: "predicted_value",
    model_column: Some("model_name"),
    generated_column: Some("prediction_date"),
};

impl SourceTable {
    pub fn for_source(source: SourceKind) -> Self {
        match source {
            SourceKind::Actual => HISTORICAL_DATA,
            SourceKind::ExternalForecast => RTE_FORECASTS,
            SourceKind::InternalForecast => PREDICTIONS,
        }
    }

    /// Windowed row query. Binds: `$1` start, `$2` end, `$3` model when `with_model`.
    ///
    /// `time_cast` is the SQL type of the timestamp columns (`timestamptz` or
    /// `timestamp`) so that absent columns still decode with the row shape.
    pub fn rows_sql(&self, time_cast: &str, with_model: bool) -> String {
        let model = self
            .model_column
            .map_or_else(|| "NULL::text".to_string(), |c| format!("\"{}\"", c));
        let generated = self.generated_column.map_or_else(
            || format!("NULL::{}", time_cast),
            |c| format!("\"{}\"", c),
        );

        let mut sql = format!(
            "SELECT \"{time}\" AS ts, \"{value}\"::float8 AS value, {model} AS model, \
             {generated} AS generated_at FROM {table} \
             WHERE \"{time}\" >= $1 AND \"{time}\" <= $2",
            time = self.time_column,
            value = self.value_column,
            model = model,
            generated = generated,
            table = self.table,
        );
        if let (true, Some(column)) = (with_model, self.model_column) {
            sql.push_str(&format!(" AND \"{}\" = $3", column));
        }
        let order: Vec<String> = std::iter::once(self.time_column)
            .chain(self.generated_column)
            .chain(self.model_column)
            .map(|c| format!("\"{}\"", c))
            .collect();
        sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
        sql
    }

    /// Count and freshness query.
    pub fn stats_sql(&self) -> String {
        format!(
            "SELECT COUNT(*) AS count, MAX(\"{}\") AS latest FROM {}",
            self.generated_column.unwrap_or(self.time_column),
            self.table
        )
    }
}
