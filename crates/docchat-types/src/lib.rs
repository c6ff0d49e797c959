//! Shared types for docchat.
//!
//! Everything here is plain data: chat messages exchanged with the upstream
//! provider and the events re-emitted to the client.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Literal `data:` payload that terminates an outbound event stream.
pub const DONE_PAYLOAD: &str = "[DONE]";

// ── Chat messages ────────────────────────────────────────────────────────────

/// Author of a chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

// ── Outbound stream ──────────────────────────────────────────────────────────

/// Unit of outbound communication towards the client.
///
/// A well-formed stream is zero or more [`StreamEvent::Fragment`]s followed
/// by exactly one [`StreamEvent::Done`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A piece of generated text.
    Fragment(String),
    /// Terminal marker.
    Done,
}

impl StreamEvent {
    /// Wire payload carried on the `data:` line of a server-sent event.
    pub fn to_sse_data(&self) -> String {
        match self {
            StreamEvent::Fragment(content) => {
                serde_json::json!({ "content": content }).to_string()
            }
            StreamEvent::Done => DONE_PAYLOAD.to_owned(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StreamEvent::Done)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
