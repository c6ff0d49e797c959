//! Unified server error type.
//!
//! Handlers return `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON body
//! `{ "error": ..., "kind": ... }` with a matching status code.
//!
//! Upstream errors are logged with full detail, but callers only ever see
//! a generic message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use docchat_core::OrchestratorError;

/// Message returned for any failure before the stream starts.
pub const GENERIC_FAILURE: &str = "Failed to process your request";

/// All errors that can occur in the docchat-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Orchestration failed before any output was produced.
    #[error("orchestration error: {0}")]
    Orchestrator(#[from] OrchestratorError),
}

impl ServerError {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "bad_request",
            ServerError::Orchestrator(e) => e.kind(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, client_message) = match &self {
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Orchestrator(OrchestratorError::EmptyConversation) => (
                StatusCode::BAD_REQUEST,
                OrchestratorError::EmptyConversation.to_string(),
            ),
            ServerError::Orchestrator(e) => {
                error!(error = %e, kind, "request failed before streaming");
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE.to_owned())
            }
        };
        (status, Json(json!({ "error": client_message, "kind": kind }))).into_response()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
