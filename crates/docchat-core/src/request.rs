//! Incoming request model and generation-path selection.

use std::borrow::Cow;

use strum::{Display, IntoStaticStr};

use docchat_types::ChatMessage;

/// Prefix identifying a message that declares an attached file.
pub const ATTACHMENT_SENTINEL: &str = "Attached file (";

/// Hard cap on embedded file content, in characters.
pub const MAX_FILE_CHARS: usize = 6000;

/// Appended to file content that was cut at [`MAX_FILE_CHARS`].
pub const TRUNCATION_MARKER: &str = "\n... (truncated)";

const GROUNDED_INSTRUCTION: &str = "You are an AI assistant. Use ONLY the following file content \
     to answer the user's question. File content:\n";

/// A chat request as received from the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingRequest {
    /// Conversation in order; the last message is the one being answered.
    pub messages: Vec<ChatMessage>,
    /// Raw content of the attached file.
    pub file_content: Option<String>,
    /// Secondary location of the file content, read only when the primary
    /// field is absent.
    pub nested_file_content: Option<String>,
}

impl IncomingRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_file_content(mut self, content: impl Into<String>) -> Self {
        self.file_content = Some(content.into());
        self
    }

    pub fn with_nested_file_content(mut self, content: impl Into<String>) -> Self {
        self.nested_file_content = Some(content.into());
        self
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// File content from the first field that is present, or `None` when
    /// that field is blank. A blank primary field is not backfilled from the
    /// secondary one.
    pub fn resolved_file_content(&self) -> Option<&str> {
        self.file_content
            .as_deref()
            .or(self.nested_file_content.as_deref())
            .filter(|c| !c.trim().is_empty())
    }

    /// `true` when the last message begins with [`ATTACHMENT_SENTINEL`].
    pub fn declares_attachment(&self) -> bool {
        self.last_message()
            .is_some_and(|m| m.content.starts_with(ATTACHMENT_SENTINEL))
    }
}

// ── Path selection ───────────────────────────────────────────────────────────

/// Which upstream path answers a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum PathKind {
    DirectGrounded,
    ConversationalRetrieval,
}

/// Pure classification of a request; no upstream calls are made.
pub fn classify(request: &IncomingRequest) -> PathKind {
    if request.declares_attachment() && request.resolved_file_content().is_some() {
        PathKind::DirectGrounded
    } else {
        PathKind::ConversationalRetrieval
    }
}

/// A selected path together with the messages it will send upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationPath {
    /// One completion over a grounded system prompt and the user query.
    DirectGrounded { prompt: [ChatMessage; 2] },
    /// Thread replay plus a run, with a direct completion over the same
    /// history as fallback.
    ConversationalRetrieval { history: Vec<ChatMessage> },
}

impl GenerationPath {
    pub fn select(request: IncomingRequest) -> Self {
        match classify(&request) {
            PathKind::DirectGrounded => {
                let content = request.resolved_file_content().unwrap_or_default();
                let query = request
                    .last_message()
                    .map(|m| extract_user_query(&m.content))
                    .unwrap_or_default();
                GenerationPath::DirectGrounded {
                    prompt: grounded_prompt(content, query),
                }
            }
            PathKind::ConversationalRetrieval => GenerationPath::ConversationalRetrieval {
                history: request.messages,
            },
        }
    }

    pub fn kind(&self) -> PathKind {
        match self {
            GenerationPath::DirectGrounded { .. } => PathKind::DirectGrounded,
            GenerationPath::ConversationalRetrieval { .. } => PathKind::ConversationalRetrieval,
        }
    }
}

/// Cut `content` to [`MAX_FILE_CHARS`] characters, appending the marker
/// when anything was removed.
pub fn truncate_file_content(content: &str) -> Cow<'_, str> {
    match content.char_indices().nth(MAX_FILE_CHARS) {
        Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &content[..cut])),
        None => Cow::Borrowed(content),
    }
}

/// Everything after the attachment-declaration line, trimmed.
pub fn extract_user_query(text: &str) -> &str {
    text.split_once('\n').map_or("", |(_, rest)| rest.trim())
}

/// System instruction plus user query; prior history is not included.
pub fn grounded_prompt(file_content: &str, query: &str) -> [ChatMessage; 2] {
    let content = truncate_file_content(file_content);
    [
        ChatMessage::system(format!("{GROUNDED_INSTRUCTION}{content}")),
        ChatMessage::user(query),
    ]
}

// ── Tests ──────────────────────────────────────────────────────────────────────
