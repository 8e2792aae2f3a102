//! HTTP handlers for fixes, boundaries and alerts.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use herdfence::models::{
    check_limit, timestamp, AlertRecord, Boundary, BoundaryRequest, GeoPoint, GpsFix,
    LocationRecord, DEFAULT_LIST_LIMIT,
};
use herdfence::pip::Evaluation;
use herdfence::store::StoreError;
use herdfence::tracker::{IngestError, IngestOutcome, Tracker};

/// Application state shared across handlers
pub struct AppState {
    pub tracker: Arc<Tracker>,
}

type ApiError = (StatusCode, String);

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/gps", post(gps_handler))
        .route("/animals/{animal_id}/latest", get(latest_handler))
        .route("/animals/{animal_id}/history", get(history_handler))
        .route("/geofence", get(get_geofence_handler).post(update_geofence_handler))
        .route("/geofence/boundaries", get(list_boundaries_handler))
        .route("/geofence/boundaries/{name}", get(boundary_by_name_handler))
        .route("/geofence/check", get(check_handler))
        .route("/alerts", get(alerts_handler))
        .route("/alerts/{animal_id}", get(animal_alerts_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn store_error(e: StoreError) -> ApiError {
    tracing::error!("Store access failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn invalid<E: std::fmt::Display>(e: E) -> ApiError {
    (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
}

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
    version: &'static str,
}

async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Livestock Tracking System API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// Ingest a GPS fix
async fn gps_handler(
    State(state): State<Arc<AppState>>,
    Json(fix): Json<GpsFix>,
) -> Result<Json<IngestOutcome>, ApiError> {
    match state.tracker.ingest(fix).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(IngestError::Invalid(e)) => Err(invalid(e)),
        Err(IngestError::Store(e)) => Err(store_error(e)),
    }
}

async fn latest_handler(
    State(state): State<Arc<AppState>>,
    Path(animal_id): Path<String>,
) -> Result<Json<LocationRecord>, ApiError> {
    state
        .tracker
        .tracking()
        .latest_location(&animal_id)
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("No location data found for animal {}", animal_id),
            )
        })
}

#[derive(Deserialize)]
struct HistoryParams {
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    end_date: Option<DateTime<Utc>>,
}

async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path(animal_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<LocationRecord>>, ApiError> {
    let history = state
        .tracker
        .tracking()
        .location_history(&animal_id, params.start_date, params.end_date)
        .map_err(store_error)?;

    if history.is_empty() {
        return Err((
            StatusCode::NOT_FOUND,
            format!("No location history found for animal {}", animal_id),
        ));
    }
    Ok(Json(history))
}

/// Save a boundary; an existing boundary with the same name is replaced
async fn update_geofence_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BoundaryRequest>,
) -> Result<Json<Boundary>, ApiError> {
    request.validate().map_err(invalid)?;
    state
        .tracker
        .boundaries()
        .upsert(&request.name, &request.polygon())
        .map(Json)
        .map_err(store_error)
}

async fn get_geofence_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Boundary>, ApiError> {
    state
        .tracker
        .boundaries()
        .resolve_current()
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                "No geofence boundary configured".to_string(),
            )
        })
}

/// Every saved boundary, most recently updated first
async fn list_boundaries_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Boundary>>, ApiError> {
    state
        .tracker
        .boundaries()
        .list()
        .map(Json)
        .map_err(store_error)
}

async fn boundary_by_name_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Boundary>, ApiError> {
    state
        .tracker
        .boundaries()
        .get(&name)
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("No boundary named {}", name)))
}

#[derive(Deserialize)]
struct CheckParams {
    latitude: f64,
    longitude: f64,
}

async fn check_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CheckParams>,
) -> Result<Json<Evaluation>, ApiError> {
    let point = GeoPoint::new(params.latitude, params.longitude);
    if !point.in_range() {
        return Err(invalid("coordinates out of range"));
    }
    let tracker = &state.tracker;
    Ok(Json(
        tracker
            .evaluator()
            .evaluate_current(tracker.boundaries(), &point),
    ))
}

#[derive(Deserialize)]
struct LimitParams {
    limit: Option<usize>,
}

async fn alerts_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<AlertRecord>>, ApiError> {
    let limit = check_limit(params.limit.unwrap_or(DEFAULT_LIST_LIMIT)).map_err(invalid)?;
    state
        .tracker
        .tracking()
        .alerts(limit)
        .map(Json)
        .map_err(store_error)
}

async fn animal_alerts_handler(
    State(state): State<Arc<AppState>>,
    Path(animal_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<AlertRecord>>, ApiError> {
    let limit = check_limit(params.limit.unwrap_or(DEFAULT_LIST_LIMIT)).map_err(invalid)?;
    state
        .tracker
        .tracking()
        .alerts_for_animal(&animal_id, limit)
        .map(Json)
        .map_err(store_error)
}
