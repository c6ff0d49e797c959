//! Upstream language-model provider capabilities.
//!
//! The orchestrator only ever talks to a [`Provider`]: three black-box
//! capabilities (streaming completion, thread management, streaming runs).
//! [`OpenAiProvider`] is the production implementation over HTTP; tests
//! substitute a scripted fake.

pub mod delta;
pub mod error;
pub mod openai;
pub mod sse;

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;

use docchat_types::ChatMessage;

pub use delta::{ContentPart, DeltaContent, PartText, RunEvent};
pub use error::ProviderError;
pub use openai::{OpenAiConfig, OpenAiProvider};

/// Stream of text deltas from a completion call.
pub type DeltaStream = BoxStream<'static, Result<String, ProviderError>>;

/// Stream of events from a thread run.
pub type RunEventStream = BoxStream<'static, Result<RunEvent, ProviderError>>;

/// Identifier of a provider-owned conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadId(pub String);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ThreadId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Capability set consumed from the upstream provider.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Start a streaming chat completion over `messages`.
    async fn create_completion(
        &self,
        messages: &[ChatMessage],
    ) -> Result<DeltaStream, ProviderError>;

    /// Create an empty conversation thread.
    async fn create_thread(&self) -> Result<ThreadId, ProviderError>;

    /// Append one message to the end of a thread.
    async fn append_message(
        &self,
        thread_id: &ThreadId,
        message: &ChatMessage,
    ) -> Result<(), ProviderError>;

    /// Start a streaming run of `assistant_id` against a thread.
    async fn run_thread_streaming(
        &self,
        thread_id: &ThreadId,
        assistant_id: &str,
    ) -> Result<RunEventStream, ProviderError>;
}
