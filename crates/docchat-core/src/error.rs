use std::time::Duration;

use docchat_provider::ProviderError;
use thiserror::Error;

/// Errors produced while orchestrating a response.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The request carried no messages; there is nothing to answer.
    #[error("conversation has no messages")]
    EmptyConversation,

    /// An upstream provider call failed.
    #[error("upstream provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The response ran past the configured execution bound.
    #[error("response exceeded the maximum execution time of {0:?}")]
    DeadlineExceeded(Duration),
}

impl OrchestratorError {
    /// Stable, machine-checkable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::EmptyConversation => "bad_request",
            OrchestratorError::Provider(_) => "upstream",
            OrchestratorError::DeadlineExceeded(_) => "timeout",
        }
    }
}
