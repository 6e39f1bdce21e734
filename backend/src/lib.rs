//! # Loadwatch
//!
//! Serves hourly electricity-load series: observed consumption, the grid
//! operator's day-ahead forecast and in-house model forecasts, individually or
//! merged on a canonical instant key.
//!
//! ## Architecture
//!
//! - [`models`]: instants, windows, per-source series and merged records
//! - [`services`]: window resolution, timestamp normalization, merge, status
//! - [`db`]: repository traits with Postgres and in-memory implementations
//! - [`http`]: axum router and handlers (feature `http-server`)

// RepositoryError carries structured context
#![allow(clippy::result_large_err)]

pub mod db;
pub mod models;
pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
