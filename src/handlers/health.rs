use axum::{extract::State, Json};
use crate::{models::HealthResponse, AppState};
use std::sync::Arc;
use tracing::debug;

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint
pub async fn ready_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    debug!("Readiness check requested");
    // The relay is in-process; answering at all means it is accepting joins.
    let stats = state.relay.stats();
    Json(HealthResponse {
        status: "ok".to_string(),
        message: format!(
            "Relay ready ({} connections in {} rooms)",
            stats.connections, stats.rooms
        ),
    })
}
