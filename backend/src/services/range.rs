//! Resolution of request parameters into a concrete query window.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use serde::Deserialize;

use crate::models::{Instant, Window};

/// Named lookback ranges accepted by the `range` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeToken {
    SevenDays,
    ThirtyDays,
    NinetyDays,
}

impl RangeToken {
    /// Lenient parse: unknown or missing tokens fall back to 90 days.
    pub fn resolve(token: Option<&str>) -> Self {
        match token.map(str::trim) {
            Some("7d") => RangeToken::SevenDays,
            Some("30d") => RangeToken::ThirtyDays,
            Some("90d") | None | Some("") => RangeToken::NinetyDays,
            Some(other) => {
                log::debug!("unsupported range token {:?}, using 90d", other);
                RangeToken::NinetyDays
            }
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            RangeToken::SevenDays => 7,
            RangeToken::ThirtyDays => 30,
            RangeToken::NinetyDays => 90,
        }
    }
}

/// Raw window parameters as received from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RangeQuery {
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

/// Window parameters that cannot be honoured.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("invalid {param} instant: {value:?}")]
    InvalidBound { param: &'static str, value: String },

    #[error("end {end} is before start {start}")]
    EndBeforeStart { start: Instant, end: Instant },

    #[error("{missing} is required when {present} is given")]
    IncompleteWindow {
        present: &'static str,
        missing: &'static str,
    },

    #[error("range of {days} days overflows the supported time span")]
    Overflow { days: i64 },
}

/// Resolve request parameters into a window, relative to `now` in range mode.
///
/// Explicit `start`/`end` take precedence over `range`. Empty parameters count as
/// absent; a lone bound, an unparsable bound or `end < start` is rejected.
pub fn resolve_window(query: &RangeQuery, now: Instant) -> Result<Window, RangeError> {
    let start = non_empty(&query.start);
    let end = non_empty(&query.end);

    match (start, end) {
        (Some(start), Some(end)) => {
            let start = parse_bound("start", start)?;
            let end = parse_bound("end", end)?;
            Window::new(start, end).ok_or(RangeError::EndBeforeStart { start, end })
        }
        (Some(_), None) => Err(RangeError::IncompleteWindow {
            present: "start",
            missing: "end",
        }),
        (None, Some(_)) => Err(RangeError::IncompleteWindow {
            present: "end",
            missing: "start",
        }),
        (None, None) => {
            let days = RangeToken::resolve(query.range.as_deref()).days();
            let start = now
                .checked_sub(TimeDelta::days(days))
                .ok_or(RangeError::Overflow { days })?;
            Window::new(start, now).ok_or(RangeError::Overflow { days })
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parse an ISO-8601 bound. Values without an offset are taken as UTC.
pub fn parse_bound(param: &'static str, value: &str) -> Result<Instant, RangeError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(Instant::from_datetime(&dt));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Instant::from_datetime(&naive.and_utc()));
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(Instant::from_datetime(&midnight.and_utc()));
    }
    Err(RangeError::InvalidBound {
        param,
        value: value.to_string(),
    })
}
