//! Route handler functions for all API endpoints.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use concierge_core::ConversationStats;

use crate::error::ApiError;
use crate::state::AppState;
use crate::ws;

/// Longest accepted client id.
pub const MAX_CLIENT_ID_LENGTH: usize = 128;

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub message: String,
    pub version: String,
    pub status: String,
    pub embedding_model: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub catalog_size: usize,
    pub active_sessions: usize,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub client_id: String,
    pub stats: ConversationStats,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub client_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET / - service info.
pub async fn root(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Experience Concierge API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        embedding_model: state.catalog.model_name(),
    })
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        catalog_size: state.catalog.len(),
        active_sessions: state.hub.active_sessions(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /api/stats/{client_id}
pub async fn stats(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<StatsResponse>, ApiError> {
    validate_client_id(&client_id)?;
    let stats = state.hub.stats(&client_id).await;
    Ok(Json(StatsResponse {
        client_id,
        stats,
        timestamp: Utc::now(),
    }))
}

/// POST /api/clear_memory/{client_id}
pub async fn clear_memory(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<ClearResponse>, ApiError> {
    validate_client_id(&client_id)?;
    state.hub.clear(&client_id).await?;
    info!(client_id = %client_id, "Memory cleared over REST");
    Ok(Json(ClearResponse {
        client_id,
        message: "Memory cleared successfully".to_string(),
        timestamp: Utc::now(),
    }))
}

/// GET /ws/chat/{client_id} - upgrade to the chat WebSocket.
pub async fn ws_chat(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    validate_client_id(&client_id)?;
    info!(client_id = %client_id, "WebSocket connecting");
    Ok(upgrade.on_upgrade(move |socket| async move {
        ws::run_socket(socket, &state.hub, client_id).await;
    }))
}

/// Client ids are opaque but must be short and printable.
pub fn validate_client_id(client_id: &str) -> Result<(), ApiError> {
    if client_id.trim().is_empty() {
        return Err(ApiError::BadRequest("client_id cannot be empty".to_string()));
    }
    if client_id.chars().count() > MAX_CLIENT_ID_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "client_id exceeds maximum length of {} characters",
            MAX_CLIENT_ID_LENGTH
        )));
    }
    if client_id.chars().any(char::is_control) {
        return Err(ApiError::BadRequest(
            "client_id contains control characters".to_string(),
        ));
    }
    Ok(())
}
