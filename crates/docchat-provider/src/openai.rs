//! OpenAI HTTP implementation of [`Provider`].
//!
//! Endpoints used (relative to `base_url`):
//! - `POST /chat/completions` with `stream: true`
//! - `POST /threads`
//! - `POST /threads/{id}/messages`
//! - `POST /threads/{id}/runs` with `stream: true`
//!
//! The thread and run endpoints require the `OpenAI-Beta: assistants=v2`
//! header.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::{future, StreamExt};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use docchat_types::ChatMessage;

use crate::delta::{RunEvent, ERROR_EVENT, RUN_FAILED_EVENT};
use crate::error::ProviderError;
use crate::sse::{self, SseEvent};
use crate::{DeltaStream, Provider, RunEventStream, ThreadId};

/// Default public API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default completion model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const ASSISTANTS_BETA: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

// ── Configuration ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct OpenAiConfig {
    /// Base URL without trailing slash, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Bearer credential.
    pub api_key: String,
    /// Model used for chat completions.
    pub model: String,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Serialize)]
struct RunRequest<'a> {
    assistant_id: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct ThreadObject {
    id: String,
}

#[derive(Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

// ── Provider ─────────────────────────────────────────────────────────────────

/// Provider backed by the OpenAI REST API (or any compatible endpoint).
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    /// Build a provider with a pooled HTTP client.
    ///
    /// No overall request timeout is set: responses are long-lived streams
    /// and the caller bounds their duration.
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .bearer_auth(&self.config.api_key)
    }

    fn post_assistants(&self, path: &str) -> RequestBuilder {
        self.post(path).header(ASSISTANTS_BETA.0, ASSISTANTS_BETA.1)
    }
}

/// Turn a non-success response into [`ProviderError::Api`].
async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());
    Err(ProviderError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Decode one `data:` payload of a completion stream.
///
/// Returns `Ok(None)` for chunks that carry no text (role headers, finish
/// markers, usage records).
pub fn parse_completion_chunk(data: &str) -> Result<Option<String>, ProviderError> {
    let chunk: CompletionChunk = serde_json::from_str(data)?;
    if let Some(error) = chunk.error {
        return Err(ProviderError::Stream(error.message));
    }
    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .filter(|c| !c.is_empty());
    Ok(content)
}

/// Decode one event of a run stream.
pub fn parse_run_event(event: Option<&str>, data: &str) -> Result<RunEvent, ProviderError> {
    let name = event.unwrap_or_default();
    let payload: Value = serde_json::from_str(data)?;

    if name == ERROR_EVENT {
        let message = payload
            .pointer("/error/message")
            .or_else(|| payload.get("message"))
            .and_then(Value::as_str)
            .unwrap_or(data)
            .to_owned();
        return Err(ProviderError::Stream(message));
    }
    if name == RUN_FAILED_EVENT {
        let reason = payload
            .pointer("/last_error/message")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        warn!(reason, "assistant run failed upstream");
    }
    Ok(RunEvent::from_payload(name, &payload))
}

#[async_trait]
impl Provider for OpenAiProvider {
    #[instrument(skip_all, fields(model = %self.config.model, messages = messages.len()))]
    async fn create_completion(
        &self,
        messages: &[ChatMessage],
    ) -> Result<DeltaStream, ProviderError> {
        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            stream: true,
        };
        let response = self.post("chat/completions").json(&request).send().await?;
        let response = check_status(response).await?;
        debug!("completion stream opened");

        let deltas = sse::event_stream(response.bytes_stream())
            .take_while(|event| future::ready(!matches!(event, Ok(SseEvent::Done))))
            .filter_map(|event| {
                future::ready(match event {
                    Ok(SseEvent::Message { data, .. }) => parse_completion_chunk(&data).transpose(),
                    Ok(SseEvent::Done) => None,
                    Err(e) => Some(Err(e)),
                })
            });
        Ok(deltas.boxed())
    }

    #[instrument(skip_all)]
    async fn create_thread(&self) -> Result<ThreadId, ProviderError> {
        let response = self
            .post_assistants("threads")
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let thread: ThreadObject = check_status(response).await?.json().await?;
        debug!(thread_id = %thread.id, "thread created");
        Ok(ThreadId(thread.id))
    }

    #[instrument(skip_all, fields(thread_id = %thread_id, role = %message.role))]
    async fn append_message(
        &self,
        thread_id: &ThreadId,
        message: &ChatMessage,
    ) -> Result<(), ProviderError> {
        let response = self
            .post_assistants(&format!("threads/{thread_id}/messages"))
            .json(message)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(thread_id = %thread_id))]
    async fn run_thread_streaming(
        &self,
        thread_id: &ThreadId,
        assistant_id: &str,
    ) -> Result<RunEventStream, ProviderError> {
        let request = RunRequest {
            assistant_id,
            stream: true,
        };
        let response = self
            .post_assistants(&format!("threads/{thread_id}/runs"))
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;
        debug!("run stream opened");

        let events = sse::event_stream(response.bytes_stream())
            .take_while(|event| future::ready(!matches!(event, Ok(SseEvent::Done))))
            .filter_map(|event| {
                future::ready(match event {
                    Ok(SseEvent::Message { event, data }) => {
                        Some(parse_run_event(event.as_deref(), &data))
                    }
                    Ok(SseEvent::Done) => None,
                    Err(e) => Some(Err(e)),
                })
            });
        Ok(events.boxed())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
