//! Incremental parser for the conversation event stream.
//!
//! The wire format is newline-delimited frames. A frame matters only when
//! it carries the `data:` marker; the remainder is either the `[DONE]`
//! terminator or a JSON object holding the *full message so far* - a
//! snapshot, not a delta - so the latest successfully parsed frame always
//! supersedes prior state. Malformed frames are skipped without aborting
//! the stream.

use serde_json::Value;

/// Marker prefixing meaningful frames.
const DATA_MARKER: &str = "data:";
/// Literal terminator frame signaling normal end of stream.
const DONE_PAYLOAD: &str = "[DONE]";

/// One full-message snapshot extracted from a frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageSnapshot {
    /// First text part of the message, when present.
    pub text: Option<String>,
    pub conversation_id: Option<String>,
    /// Reasoning duration reported by extended-thinking models.
    pub reasoning_seconds: Option<u64>,
}

/// Stream event emitted by the parser after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Snapshot(MessageSnapshot),
    /// Explicit error field inside a frame; aborts the stream.
    UpstreamError(String),
    Done,
}

/// Incremental parser over arbitrary byte chunks.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: String,
}

impl SseStreamParser {
    /// Feed bytes into the parser and drain the complete frames.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut events = Vec::new();

        while let Some(split) = self.buffer.find('\n') {
            let line = self.buffer[..split].trim_end_matches('\r').to_string();
            self.buffer.drain(0..=split);

            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }

        events
    }

    /// Parse a complete stream body in one shot.
    pub fn parse_all(input: &str) -> Vec<StreamEvent> {
        let mut parser = Self::default();
        let mut events = parser.feed(input.as_bytes());
        // A final frame without a trailing newline still counts.
        if !parser.buffer.trim().is_empty() {
            let tail = std::mem::take(&mut parser.buffer);
            if let Some(event) = parse_line(tail.trim_end_matches('\r')) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_line(line: &str) -> Option<StreamEvent> {
    let payload = line.strip_prefix(DATA_MARKER)?.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == DONE_PAYLOAD {
        return Some(StreamEvent::Done);
    }

    let value = serde_json::from_str::<Value>(payload).ok()?;
    Some(map_frame(&value))
}

fn map_frame(value: &Value) -> StreamEvent {
    if let Some(error) = value.get("error").filter(|error| !error.is_null()) {
        let message = match error.as_str() {
            Some(text) => text.to_string(),
            None => error.to_string(),
        };
        return StreamEvent::UpstreamError(message);
    }

    let message = value.get("message");
    let text = message
        .and_then(|message| message.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(|parts| parts.get(0))
        .and_then(Value::as_str)
        .map(ToString::to_string);
    let conversation_id = value
        .get("conversation_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string);
    let reasoning_seconds = message
        .and_then(|message| message.get("metadata"))
        .filter(|metadata| {
            metadata
                .get("is_reasoning")
                .and_then(Value::as_bool)
                .unwrap_or(false)
        })
        .and_then(|metadata| metadata.get("reasoning_duration"))
        .and_then(Value::as_f64)
        .filter(|seconds| *seconds >= 0.0)
        .map(|seconds| seconds as u64);

    StreamEvent::Snapshot(MessageSnapshot {
        text,
        conversation_id,
        reasoning_seconds,
    })
}

/// Running stream state: the latest snapshot wins, the conversation id is
/// captured once, and the reasoning duration overwrites the prior value.
#[derive(Debug, Clone, Default)]
pub struct SnapshotAccumulator {
    pub text: String,
    pub conversation_id: Option<String>,
    pub thinking_seconds: Option<u64>,
    pub done: bool,
}

impl SnapshotAccumulator {
    /// Fold one event into the running state. Returns the upstream error
    /// message when the event aborts the stream.
    pub fn apply(&mut self, event: StreamEvent) -> Result<(), String> {
        match event {
            StreamEvent::Snapshot(snapshot) => {
                if let Some(text) = snapshot.text {
                    self.text = text;
                }
                if self.conversation_id.is_none() {
                    self.conversation_id = snapshot.conversation_id;
                }
                if snapshot.reasoning_seconds.is_some() {
                    self.thinking_seconds = snapshot.reasoning_seconds;
                }
                Ok(())
            }
            StreamEvent::Done => {
                self.done = true;
                Ok(())
            }
            StreamEvent::UpstreamError(message) => Err(message),
        }
    }
}
