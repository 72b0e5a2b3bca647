//! HTTP API: `/predict`, `/scan-inbox` and `/health`.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::{ScanError, ValidationError};
use crate::scanner::{PredictRequest, ScanRequest, SpamScanner};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub scanner: Arc<SpamScanner>,
}

/// Build the router with all routes, CORS and request tracing.
pub fn routes(scanner: Arc<SpamScanner>) -> Router {
    let state = AppState { scanner };

    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/scan-inbox", post(scan_inbox))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// JSON `{"error": ...}` response for a failed request.
pub struct ApiError(ScanError);

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (
            status,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

/// Unparseable bodies are a client error, reported in the same JSON shape.
fn body_or_reject<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected request body");
            Err(ScanError::from(ValidationError::MalformedBody).into())
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "spam-scanner"
    }))
}

/// POST /predict
async fn predict(
    State(state): State<AppState>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body_or_reject(body)?;
    let response = state.scanner.classify_and_notify(&request).await?;
    Ok(Json(response))
}

/// POST /scan-inbox
async fn scan_inbox(
    State(state): State<AppState>,
    body: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body_or_reject(body)?;
    let response = state.scanner.scan_and_notify(&request).await?;
    Ok(Json(response))
}
