//! Line-buffering Server-Sent Events parser for upstream streams.
//!
//! TCP chunk boundaries never line up with SSE frames: one chunk may carry
//! several events, and a JSON payload (or a multi-byte UTF-8 character) may
//! be split across two chunks. [`SseLineBuffer`] keeps the incomplete tail
//! between `feed` calls and only dispatches an event once its terminating
//! blank line has arrived.

use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};

use crate::error::ProviderError;

/// A dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A regular event; `event` is the value of the `event:` field, if any.
    Message { event: Option<String>, data: String },
    /// The `[DONE]` sentinel used by OpenAI-style streams.
    Done,
}

/// Incremental SSE frame decoder.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk and return every event it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let line = line.trim_end_matches('\r');
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Dispatch whatever is left once the byte stream has ended.
    pub fn flush(&mut self) -> Vec<SseEvent> {
        let tail = mem::take(&mut self.pending);
        let mut events = Vec::new();
        if !tail.is_empty() {
            let line = String::from_utf8_lossy(&tail);
            if let Some(event) = self.process_line(line.trim_end_matches('\r')) {
                events.push(event);
            }
        }
        if let Some(event) = self.dispatch() {
            events.push(event);
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment line.
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_owned()),
            "data" => self.data.push(value.to_owned()),
            // id:, retry: and unknown fields carry nothing we use.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = mem::take(&mut self.data).join("\n");
        if data.trim() == "[DONE]" {
            return Some(SseEvent::Done);
        }
        Some(SseEvent::Message { event, data })
    }
}

struct SseStreamState {
    bytes: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    parser: SseLineBuffer,
    pending: VecDeque<SseEvent>,
    ended: bool,
}

/// Wrap a raw `bytes_stream()` in SSE framing.
///
/// The stream ends after the first transport error.
pub fn event_stream<S>(byte_stream: S) -> BoxStream<'static, Result<SseEvent, ProviderError>>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let state = SseStreamState {
        bytes: Box::pin(byte_stream),
        parser: SseLineBuffer::new(),
        pending: VecDeque::new(),
        ended: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.ended {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.parser.feed(&chunk);
                    state.pending.extend(events);
                }
                Some(Err(e)) => {
                    state.ended = true;
                    return Some((Err(ProviderError::Http(e)), state));
                }
                None => {
                    state.ended = true;
                    let events = state.parser.flush();
                    state.pending.extend(events);
                }
            }
        }
    })
    .boxed()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
