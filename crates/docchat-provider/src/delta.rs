//! Run events and normalization of their content deltas.
//!
//! A run's `delta.content` is loosely typed upstream: a bare string, or an
//! array whose items are strings, `{ "text": "..." }` objects, or
//! `{ "text": { "value": "..." } }` objects. Everything is reduced to plain
//! text; shapes we do not recognise contribute nothing.

use serde::Deserialize;
use serde_json::Value;

/// Event name that carries incremental message content.
pub const MESSAGE_DELTA_EVENT: &str = "thread.message.delta";
/// Event name emitted when the provider gives up on a run.
pub const RUN_FAILED_EVENT: &str = "thread.run.failed";
/// Event name used for mid-stream failures.
pub const ERROR_EVENT: &str = "error";

/// The `content` field of a run delta.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DeltaContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Other(Value),
}

/// One item of an array-shaped delta.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text(String),
    Object {
        #[serde(default)]
        text: Option<PartText>,
    },
    Other(Value),
}

/// The `text` field of an object-shaped part.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PartText {
    Value { value: String },
    Plain(String),
    Other(Value),
}

impl DeltaContent {
    /// Concatenate every recognised text piece in order.
    pub fn to_text(&self) -> String {
        match self {
            DeltaContent::Text(text) => text.clone(),
            DeltaContent::Parts(parts) => parts.iter().map(ContentPart::as_text).collect(),
            DeltaContent::Other(_) => String::new(),
        }
    }
}

impl ContentPart {
    fn as_text(&self) -> &str {
        match self {
            ContentPart::Text(text) => text.as_str(),
            ContentPart::Object {
                text: Some(PartText::Value { value }),
            } => value.as_str(),
            ContentPart::Object {
                text: Some(PartText::Plain(text)),
            } => text.as_str(),
            _ => "",
        }
    }
}

/// A single event from a streaming run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunEvent {
    /// SSE event name, e.g. `thread.message.delta`.
    pub event: String,
    /// Content delta, when the event carries one.
    pub delta: Option<DeltaContent>,
}

impl RunEvent {
    pub fn new(event: impl Into<String>, delta: Option<DeltaContent>) -> Self {
        Self {
            event: event.into(),
            delta,
        }
    }

    /// Convenience constructor for a message delta with plain text.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(MESSAGE_DELTA_EVENT, Some(DeltaContent::Text(text.into())))
    }

    /// Normalized text of the delta, or `None` when the event has no delta.
    pub fn fragment(&self) -> Option<String> {
        self.delta.as_ref().map(DeltaContent::to_text)
    }

    /// Build an event from a decoded `data:` payload.
    ///
    /// Any event whose payload exposes `delta.content` is treated as a
    /// content-bearing event regardless of its name.
    pub fn from_payload(event: impl Into<String>, payload: &Value) -> Self {
        let delta = payload
            .get("delta")
            .and_then(|d| d.get("content"))
            .and_then(|c| serde_json::from_value::<DeltaContent>(c.clone()).ok());
        Self::new(event, delta)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn normalize(content: Value) -> String {
        serde_json::from_value::<DeltaContent>(content)
            .unwrap()
            .to_text()
    }

    #[test]
    fn plain_string_delta() {
        assert_eq!(normalize(json!("Hello")), "Hello");
    }

    #[test]
    fn assistants_v2_text_value_parts() {
        let content = json!([
            { "index": 0, "type": "text", "text": { "value": "Hel" } },
            { "index": 1, "type": "text", "text": { "value": "lo" } }
        ]);
        assert_eq!(normalize(content), "Hello");
    }

    #[test]
    fn mixed_part_shapes_concatenate_in_order() {
        let content = json!(["a", { "text": "b" }, { "text": { "value": "c" } }]);
        assert_eq!(normalize(content), "abc");
    }

    #[test]
    fn unknown_shapes_contribute_nothing() {
        let content = json!([
            42,
            null,
            { "type": "image_file" },
            { "text": { "value": 3 } },
            "ok"
        ]);
        assert_eq!(normalize(content), "ok");
        assert_eq!(normalize(json!({ "value": "x" })), "");
    }

    #[test]
    fn event_without_delta_content_has_no_fragment() {
        let event = RunEvent::from_payload("thread.run.created", &json!({ "id": "run_1" }));
        assert_eq!(event.fragment(), None);

        let step = RunEvent::from_payload(
            "thread.run.step.delta",
            &json!({ "delta": { "step_details": {} } }),
        );
        assert_eq!(step.fragment(), None);
    }

    #[test]
    fn message_delta_payload() {
        let payload = json!({
            "id": "msg_1",
            "object": "thread.message.delta",
            "delta": { "content": [{ "index": 0, "type": "text", "text": { "value": "Paris" } }] }
        });
        let event = RunEvent::from_payload(MESSAGE_DELTA_EVENT, &payload);
        assert_eq!(event.fragment().as_deref(), Some("Paris"));
    }
}
