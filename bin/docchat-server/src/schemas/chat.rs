//! Wire types for `POST /api/chat`.
//!
//! Field names follow the browser client (`fileContent`, camelCase).

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use docchat_core::IncomingRequest;
use docchat_types::{ChatMessage, Role};

/// A file attached to a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachedFile {
    /// Raw text of the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_content: Option<String>,
}

/// A single message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageBody {
    /// `"system"`, `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
    /// File content attached to this message. Only read on the last message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<AttachedFile>,
}

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Conversation in order; the last message is answered.
    pub messages: Vec<ChatMessageBody>,
    /// Request-level file content, used when the last message has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_content: Option<String>,
}

/// One SSE `data:` payload (other than the `[DONE]` marker).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatChunk {
    pub content: String,
}

impl TryFrom<ChatRequest> for IncomingRequest {
    type Error = String;

    /// File content comes from the first field present on the last message,
    /// then its nested `file`, then the request itself. A present but blank
    /// field is kept so that it disables the file path.
    fn try_from(body: ChatRequest) -> Result<Self, Self::Error> {
        let ChatRequest {
            messages,
            file_content,
        } = body;

        let (message_file, nested_file) = match messages.last() {
            Some(last) => (
                last.file_content.clone(),
                last.file.as_ref().and_then(|f| f.file_content.clone()),
            ),
            None => (None, None),
        };

        let messages = messages
            .into_iter()
            .enumerate()
            .map(|(i, m)| {
                Role::from_str(&m.role)
                    .map(|role| ChatMessage::new(role, m.content))
                    .map_err(|_| format!("messages[{i}]: unknown role '{}'", m.role))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(IncomingRequest {
            messages,
            file_content: message_file,
            nested_file_content: nested_file.or(file_content),
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use docchat_core::{PathKind, classify};
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<IncomingRequest, String> {
        let body: ChatRequest = serde_json::from_value(value).unwrap();
        IncomingRequest::try_from(body)
    }

    #[test]
    fn message_level_file_content_wins() {
        let req = parse(json!({
            "messages": [{
                "role": "user",
                "content": "Attached file (a.txt)\nq",
                "fileContent": "from message",
                "file": { "fileContent": "from nested" }
            }],
            "fileContent": "from request"
        }))
        .unwrap();
        assert_eq!(req.resolved_file_content(), Some("from message"));
    }

    #[test]
    fn nested_then_request_level_content_are_fallbacks() {
        let nested = parse(json!({
            "messages": [{
                "role": "user",
                "content": "q",
                "file": { "fileContent": "from nested" }
            }],
            "fileContent": "from request"
        }))
        .unwrap();
        assert_eq!(nested.resolved_file_content(), Some("from nested"));

        let top = parse(json!({
            "messages": [{ "role": "user", "content": "q" }],
            "fileContent": "from request"
        }))
        .unwrap();
        assert_eq!(top.resolved_file_content(), Some("from request"));
    }

    #[test]
    fn blank_message_content_is_not_replaced_by_other_sources() {
        let req = parse(json!({
            "messages": [{
                "role": "user",
                "content": "Attached file (a.txt)\nq",
                "fileContent": "  ",
                "file": { "fileContent": "from nested" }
            }],
            "fileContent": "from request"
        }))
        .unwrap();
        assert_eq!(req.resolved_file_content(), None);
        assert_eq!(classify(&req), PathKind::ConversationalRetrieval);
    }

    #[test]
    fn only_the_last_message_carries_the_file() {
        let req = parse(json!({
            "messages": [
                { "role": "user", "content": "a", "fileContent": "old" },
                { "role": "user", "content": "b" }
            ]
        }))
        .unwrap();
        assert_eq!(req.resolved_file_content(), None);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = parse(json!({
            "messages": [
                { "role": "user", "content": "a" },
                { "role": "tool", "content": "b" }
            ]
        }))
        .unwrap_err();
        assert!(err.contains("messages[1]"));
        assert!(err.contains("tool"));
    }

    #[test]
    fn roles_and_order_are_preserved() {
        let req = parse(json!({
            "messages": [
                { "role": "system", "content": "s" },
                { "role": "user", "content": "u" },
                { "role": "assistant", "content": "a" }
            ]
        }))
        .unwrap();
        let roles: Vec<Role> = req.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    }
}
