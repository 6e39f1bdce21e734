//! HTTP handlers for the REST API.
//!
//! Each handler resolves the request window and delegates to the service layer.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::dto::{
    CombinedPoint, HealthResponse, PredictionPoint, RealPoint, RteForecastPoint, SeriesQuery,
    StatusResponse,
};
use super::error::AppError;
use super::state::AppState;
use crate::db::repository::StatusRepository;
use crate::models::{Instant, SourceKind, SourcePoint, Window};
use crate::services::{self, SeriesError};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Header listing sources that were treated as empty after a read failure.
pub const DEGRADED_SOURCES_HEADER: HeaderName = HeaderName::from_static("x-degraded-sources");

fn resolve(query: &SeriesQuery) -> Result<Window, SeriesError> {
    Ok(services::resolve_window(&query.range_query(), Instant::now())?)
}

async fn read_points<T: From<SourcePoint>>(
    state: &AppState,
    kind: SourceKind,
    query: &SeriesQuery,
) -> HandlerResult<Vec<T>> {
    let window = resolve(query)?;
    let series = services::read_source(
        state.repository.as_ref(),
        kind,
        &window,
        &query.read_filter(),
        state.options.duplicate_policy,
    )
    .await?;
    Ok(Json(series.into_points().into_iter().map(T::from).collect()))
}

/// GET /api/data/real
pub async fn get_real(
    State(state): State<AppState>,
    Query(query): Query<SeriesQuery>,
) -> HandlerResult<Vec<RealPoint>> {
    read_points(&state, SourceKind::Actual, &query).await
}

/// GET /api/data/predictions
///
/// Accepts `model` to restrict the series to one forecasting model.
pub async fn get_predictions(
    State(state): State<AppState>,
    Query(query): Query<SeriesQuery>,
) -> HandlerResult<Vec<PredictionPoint>> {
    read_points(&state, SourceKind::InternalForecast, &query).await
}

/// GET /api/data/rte-forecasts
pub async fn get_rte_forecasts(
    State(state): State<AppState>,
    Query(query): Query<SeriesQuery>,
) -> HandlerResult<Vec<RteForecastPoint>> {
    read_points(&state, SourceKind::ExternalForecast, &query).await
}

/// GET /api/data
///
/// Merged view of all three sources, one record per instant. When a source is
/// degraded its name appears in the `X-Degraded-Sources` header.
pub async fn get_combined(
    State(state): State<AppState>,
    Query(query): Query<SeriesQuery>,
) -> Result<Response, AppError> {
    let window = resolve(&query)?;
    let merged = services::read_merged(
        state.repository.as_ref(),
        &window,
        &query.read_filter(),
        &state.options,
    )
    .await?;

    let mut headers = HeaderMap::new();
    if merged.is_degraded() {
        let names: Vec<&str> = merged.degraded.iter().map(SourceKind::as_str).collect();
        let value = HeaderValue::from_str(&names.join(","))
            .map_err(|e| AppError::Internal(e.to_string()))?;
        headers.insert(DEGRADED_SOURCES_HEADER, value);
    }

    let body: Vec<CombinedPoint> = merged.records.into_iter().map(CombinedPoint::from).collect();
    Ok((headers, Json(body)).into_response())
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> HandlerResult<StatusResponse> {
    let report = services::aggregate_status(state.repository.as_ref()).await?;
    Ok(Json(report.into()))
}

/// GET /api/health
///
/// Liveness probe against the store.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.repository.health_check().await {
        Ok(true) => (StatusCode::OK, Json(HealthResponse::ok(Instant::now()))),
        Ok(false) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HealthResponse::error("store reported unhealthy")),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HealthResponse::error(e.to_string())),
        ),
    }
}
