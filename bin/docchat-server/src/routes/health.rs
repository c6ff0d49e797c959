//! Liveness endpoint.
//!
//! Reports the process version and the generation settings it was started
//! with. The upstream provider is never contacted.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health), components(schemas(HealthStatus)))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    /// Always `"ok"` while the process is serving.
    pub status: String,
    pub version: String,
    /// Model used for grounded and fallback completions.
    pub model: String,
    /// `false` when `ASSISTANT_ID` is empty; conversational requests will
    /// then fail upstream.
    pub assistant_configured: bool,
    /// Upper bound on one streamed response, in seconds.
    pub max_duration_secs: u64,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is serving", body = HealthStatus)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let config = &state.config;
    Json(HealthStatus {
        status: "ok".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        model: config.model.clone(),
        assistant_configured: !config.assistant_id.trim().is_empty(),
        max_duration_secs: config.max_duration.as_secs(),
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────
