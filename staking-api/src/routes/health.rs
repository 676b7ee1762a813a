//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use tracing::error;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    storage: bool,
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.storage.ping() {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                storage: true,
            }),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    storage: false,
                }),
            )
        }
    }
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
