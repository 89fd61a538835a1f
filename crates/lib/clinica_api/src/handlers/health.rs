//! Health check endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use tracing::warn;

use crate::AppState;
use crate::models::HealthResponse;

/// `GET /health`: liveness plus data store connectivity.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let connected = match tokio::time::timeout(state.config.store_timeout, state.patients.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!("data store ping failed: {e}");
            false
        }
        Err(_) => {
            warn!("data store ping timed out");
            false
        }
    };

    let (status, body) = if connected {
        (StatusCode::OK, ("ok", "connected"))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, ("degraded", "unavailable"))
    };
    (
        status,
        Json(HealthResponse {
            status: body.0,
            database: body.1,
            version: clinica_core::version(),
        }),
    )
}
