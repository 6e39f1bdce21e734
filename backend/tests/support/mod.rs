#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use loadwatch::db::models::SourceRow;
use loadwatch::db::repositories::LocalRepository;
use loadwatch::models::SourceKind;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

/// 2024-01-01 at `h`:00 UTC.
pub fn jan1(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
}

/// Repository with the three-source example day:
/// actual at 00h and 01h, external forecast at 01h and 02h, internal at 02h.
pub fn example_repository() -> LocalRepository {
    let repo = LocalRepository::new();
    repo.insert_rows(
        SourceKind::Actual,
        vec![SourceRow::new(jan1(0), 52_300.0), SourceRow::new(jan1(1), 50_100.0)],
    );
    repo.insert_rows(
        SourceKind::ExternalForecast,
        vec![SourceRow::new(jan1(1), 50_000.0), SourceRow::new(jan1(2), 48_700.0)],
    );
    repo.insert_rows(
        SourceKind::InternalForecast,
        vec![SourceRow::new(jan1(2), 48_900.0)
            .with_model("chronos")
            .generated_at(Utc.with_ymd_and_hms(2023, 12, 31, 12, 0, 0).unwrap())],
    );
    repo
}
