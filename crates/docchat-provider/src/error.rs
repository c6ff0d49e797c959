use thiserror::Error;

/// Errors produced while talking to the upstream provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (connect, TLS, read).
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    /// A response or event payload could not be decoded.
    #[error("failed to decode provider payload: {0}")]
    Decode(String),

    /// The provider reported a failure in the middle of a stream.
    #[error("provider stream error: {0}")]
    Stream(String),
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::Decode(e.to_string())
    }
}
