//! Streaming chat route.
//!
//! Each outbound stream event becomes one SSE `data:` line. An upstream
//! failure after the stream has started aborts the response body instead of
//! sending the `[DONE]` marker.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use tracing::debug;
use utoipa::OpenApi;

use docchat_core::IncomingRequest;

use crate::error::ServerError;
use crate::schemas::chat::{AttachedFile, ChatChunk, ChatMessageBody, ChatRequest};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(chat),
    components(schemas(ChatRequest, ChatMessageBody, AttachedFile, ChatChunk))
)]
pub struct ChatApi;

/// Register chat routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/chat", post(chat))
}

/// Answer the last message of a conversation as a server-sent event stream.
///
/// A last message starting with `Attached file (` plus non-empty file content
/// is answered from the file alone; anything else goes through the
/// retrieval-augmented assistant, with a plain completion as fallback when
/// its answer hedges.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "`data: {\"content\": ...}` events, then `data: [DONE]`",
            body = ChatChunk, content_type = "text/event-stream"),
        (status = 400, description = "Malformed request"),
        (status = 500, description = "Upstream failure before streaming"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(body) = body.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    if body.messages.is_empty() {
        return Err(ServerError::BadRequest("messages must not be empty".into()));
    }

    let request = IncomingRequest::try_from(body).map_err(ServerError::BadRequest)?;
    debug!(
        messages = request.messages.len(),
        file_len = request.resolved_file_content().map(str::len),
        "chat request"
    );

    let events = state.orchestrator.handle(request).await?;
    let sse_stream =
        events.map(|item| item.map(|event| Event::default().data(event.to_sse_data())));

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(sse_stream),
    )
        .into_response())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
