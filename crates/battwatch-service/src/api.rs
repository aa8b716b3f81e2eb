//! REST API endpoints for the battwatch service.
//!
//! # Endpoints
//!
//! - `POST /data` - Accept one telemetry sample from the device
//! - `GET /latest` - Most recent sample with its state-of-health score
//! - `GET /history?limit=N` - Recent samples, oldest first
//! - `GET /health` - Liveness and sample count
//! - `GET /soh` - State-of-health score with the statistics behind it
//!
//! ## Error Handling
//!
//! Errors are returned as `{"error": "..."}` via [`AppError`]. Payloads that
//! parse as JSON but fail validation return 422; malformed query parameters
//! return 400. Snapshot write failures never surface here; ingestion succeeds
//! as long as the sample is valid.
//!
//! # Example
//!
//! ```ignore
//! use battwatch_service::api;
//!
//! let app = api::router().with_state(state);
//! ```

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use battwatch_core::ValidationError;
use battwatch_types::Sample;

use crate::state::{AppState, HealthReport, HistoryPage, LatestStatus, SohReport};

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // Device-facing
        .route("/data", post(receive_data))
        // Dashboard-facing
        .route("/latest", get(latest))
        .route("/history", get(history))
        .route("/soh", get(soh))
        .route("/health", get(health))
}

/// The full application: routes, request tracing and permissive CORS.
pub fn app(state: Arc<AppState>) -> Router {
    router()
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Response to an accepted sample.
#[derive(Debug, Serialize)]
pub struct ReceivedResponse {
    pub status: &'static str,
    pub data: Sample,
}

/// Accept a telemetry sample.
///
/// Numeric fields may be JSON numbers or numeric strings. Samples without a
/// `timestamp` are stamped with the time they arrive.
async fn receive_data(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<Json<ReceivedResponse>, AppError> {
    let sample = battwatch_core::ingest_value(&payload, OffsetDateTime::now_utc())?;
    let receipt = state.ingest(sample).await;

    Ok(Json(ReceivedResponse {
        status: "received",
        data: receipt.sample,
    }))
}

/// Latest sample flattened together with its health score.
#[derive(Debug, Serialize)]
pub struct LatestResponse {
    #[serde(flatten)]
    pub sample: Sample,
    pub soh: f64,
}

#[derive(Debug, Serialize)]
struct StatusOnly {
    status: &'static str,
}

async fn latest(State(state): State<Arc<AppState>>) -> Response {
    match state.latest_with_health().await {
        LatestStatus::Reading { sample, soh } => Json(LatestResponse { sample, soh }).into_response(),
        LatestStatus::NoData => Json(StatusOnly {
            status: "no data yet",
        })
        .into_response(),
    }
}

/// Query parameters for `/history`.
#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub page: HistoryPage,
}

/// Recent history.
///
/// # Errors
///
/// Returns [`AppError::BadRequest`] if `limit` is not an integer. Out-of-range
/// integers are clamped rather than rejected.
async fn history(
    State(state): State<Arc<AppState>>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let page = state.history(query.limit).await;

    Ok(Json(HistoryResponse {
        status: "success",
        page,
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.health_check().await)
}

async fn soh(State(state): State<Arc<AppState>>) -> Json<SohReport> {
    Json(state.soh_report().await)
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    BadRequest(String),
    Internal(String),
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::Validation(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}
