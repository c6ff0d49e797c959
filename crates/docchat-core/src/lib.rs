//! docchat-core – response orchestration.
//!
//! Given a chat request, pick between a file-grounded direct completion and
//! a retrieval-augmented thread run, watch the run's output for hedging, and
//! fall back to a direct completion when it looks unhelpful. The caller sees
//! one uniform [`EventStream`].

mod deadline;
mod error;
mod orchestrator;
mod request;
mod verdict;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod tests;

pub use deadline::with_deadline;
pub use error::OrchestratorError;
pub use orchestrator::{EventStream, Orchestrator, OrchestratorConfig};
pub use request::{
    classify, extract_user_query, grounded_prompt, truncate_file_content, GenerationPath,
    IncomingRequest, PathKind, ATTACHMENT_SENTINEL, MAX_FILE_CHARS, TRUNCATION_MARKER,
};
pub use verdict::{is_unhelpful, UsefulnessVerdict};
