//! The response orchestrator.
//!
//! [`Orchestrator::handle`] selects a [`GenerationPath`], performs the
//! upstream setup calls, and returns a single outbound event stream. The
//! stream is driven by an explicit state machine:
//!
//! ```text
//! Direct ──────────────────────────────────────────────▶ Closed
//! Primary ──(useful)───────────────────────────────────▶ Closed
//! Primary ──(unhelpful or empty)──▶ Fallback ──────────▶ Closed
//! ```
//!
//! `Fallback` is only reachable from `Primary`, and `Primary` is left by
//! value, so the fallback completion runs at most once per request.
//! Primary and fallback output are concatenated, never interleaved.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use docchat_provider::{DeltaStream, Provider, RunEventStream};
use docchat_types::{ChatMessage, StreamEvent};

use crate::deadline::with_deadline;
use crate::error::OrchestratorError;
use crate::request::{GenerationPath, IncomingRequest, TRUNCATION_MARKER};
use crate::verdict::UsefulnessVerdict;

/// Outbound stream handed to the transport.
///
/// Yields fragments followed by exactly one [`StreamEvent::Done`], or ends
/// with an `Err` item (and nothing after it) when an upstream call fails.
pub type EventStream = BoxStream<'static, Result<StreamEvent, OrchestratorError>>;

/// Settings read once per process.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Assistant identity used for conversational runs. Empty is accepted.
    pub assistant_id: String,
    /// Upper bound on the lifetime of one response, setup included.
    pub max_duration: Option<Duration>,
}

pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn Provider>, config: OrchestratorConfig) -> Self {
        Self { provider, config }
    }

    /// Answer one request.
    ///
    /// Setup (opening the completion, or creating the thread, replaying the
    /// history and starting the run) completes before this returns, so a
    /// failure there is reported as an `Err` instead of a stream.
    #[instrument(skip_all, fields(messages = request.messages.len()))]
    pub async fn handle(&self, request: IncomingRequest) -> Result<EventStream, OrchestratorError> {
        if request.messages.is_empty() {
            return Err(OrchestratorError::EmptyConversation);
        }

        let deadline = self.config.max_duration.map(|d| (Instant::now() + d, d));
        let path = GenerationPath::select(request);
        info!(path = %path.kind(), "generation path selected");

        let phase = match deadline {
            Some((at, limit)) => tokio::time::timeout_at(at, self.open(path))
                .await
                .map_err(|_| OrchestratorError::DeadlineExceeded(limit))??,
            None => self.open(path).await?,
        };

        let stream = Driver {
            phase,
            provider: Arc::clone(&self.provider),
        }
        .into_stream();

        Ok(match deadline {
            Some((at, limit)) => with_deadline(stream, at, limit),
            None => stream,
        })
    }

    async fn open(&self, path: GenerationPath) -> Result<Phase, OrchestratorError> {
        match path {
            GenerationPath::DirectGrounded { prompt } => {
                debug!(
                    system_len = prompt[0].content.len(),
                    query_len = prompt[1].content.len(),
                    truncated = prompt[0].content.ends_with(TRUNCATION_MARKER),
                    "opening grounded completion"
                );
                let deltas = self.provider.create_completion(&prompt).await?;
                Ok(Phase::Direct(deltas))
            }
            GenerationPath::ConversationalRetrieval { history } => {
                let thread_id = self.provider.create_thread().await?;
                // Thread state is order-sensitive: one append at a time.
                for message in &history {
                    self.provider.append_message(&thread_id, message).await?;
                }
                debug!(%thread_id, replayed = history.len(), "history replayed into thread");

                let events = self
                    .provider
                    .run_thread_streaming(&thread_id, &self.config.assistant_id)
                    .await?;
                Ok(Phase::Primary {
                    events,
                    verdict: UsefulnessVerdict::new(),
                    history,
                })
            }
        }
    }
}

// ── Stream state machine ─────────────────────────────────────────────────────

enum Phase {
    /// Grounded completion; no fallback.
    Direct(DeltaStream),
    /// Retrieval-augmented run, watched by the usefulness verdict.
    Primary {
        events: RunEventStream,
        verdict: UsefulnessVerdict,
        history: Vec<ChatMessage>,
    },
    /// Direct completion over the original history.
    Fallback(DeltaStream),
    /// Terminal marker or error already emitted.
    Closed,
}

struct Driver {
    phase: Phase,
    provider: Arc<dyn Provider>,
}

impl Driver {
    fn into_stream(self) -> EventStream {
        stream::unfold(self, |mut driver| async move {
            let item = driver.next_event().await?;
            Some((item, driver))
        })
        .boxed()
    }

    async fn next_event(&mut self) -> Option<Result<StreamEvent, OrchestratorError>> {
        loop {
            match &mut self.phase {
                Phase::Direct(deltas) | Phase::Fallback(deltas) => match deltas.next().await {
                    Some(Ok(text)) if text.is_empty() => continue,
                    Some(Ok(text)) => return Some(Ok(StreamEvent::Fragment(text))),
                    Some(Err(e)) => return Some(self.fail(e.into())),
                    None => {
                        self.phase = Phase::Closed;
                        return Some(Ok(StreamEvent::Done));
                    }
                },
                Phase::Primary { events, verdict, .. } => match events.next().await {
                    Some(Ok(event)) => match event.fragment() {
                        Some(text) if !text.is_empty() => {
                            verdict.observe(&text);
                            return Some(Ok(StreamEvent::Fragment(text)));
                        }
                        _ => continue,
                    },
                    Some(Err(e)) => return Some(self.fail(e.into())),
                    None => {
                        if let Some(done) = self.finish_primary().await {
                            return Some(done);
                        }
                    }
                },
                Phase::Closed => return None,
            }
        }
    }

    /// Leave `Primary` once its run has drained. Returns the next item to
    /// emit, or `None` when the fallback stream is now active.
    async fn finish_primary(&mut self) -> Option<Result<StreamEvent, OrchestratorError>> {
        let Phase::Primary { verdict, history, .. } = mem::replace(&mut self.phase, Phase::Closed)
        else {
            return Some(Ok(StreamEvent::Done));
        };

        if verdict.is_useful() {
            debug!(fragments = verdict.fragments(), "primary run judged useful");
            return Some(Ok(StreamEvent::Done));
        }

        info!(
            fragments = verdict.fragments(),
            accumulated_len = verdict.accumulated().len(),
            "primary run judged unhelpful; falling back to direct completion"
        );
        match self.provider.create_completion(&history).await {
            Ok(deltas) => {
                self.phase = Phase::Fallback(deltas);
                None
            }
            Err(e) => Some(self.fail(e.into())),
        }
    }

    fn fail(&mut self, error: OrchestratorError) -> Result<StreamEvent, OrchestratorError> {
        warn!(error = %error, "upstream stream failed; terminating response");
        self.phase = Phase::Closed;
        Err(error)
    }
}
