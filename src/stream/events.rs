// src/stream/events.rs — Tagged event union parsed at the dispatch boundary

use serde::Deserialize;

use crate::engine::types::Operation;
use crate::infra::errors::CoachError;

/// Shown when an `error` event carries no usable message.
pub const ERROR_FALLBACK: &str = "The analysis failed. Please try again.";

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Operation(Operation),
    FinalMessage {
        message: String,
        session_id: Option<String>,
    },
    Done,
    Error {
        message: String,
    },
    /// A well-formed event with a `type` this client does not know.
    Unknown(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct FinalMessageData {
    #[serde(default)]
    message: String,
    #[serde(default)]
    session_id: Option<String>,
}

impl StreamEvent {
    /// Parse one `data:` payload.
    pub fn parse(payload: &str) -> Result<Self, CoachError> {
        let envelope: Envelope = serde_json::from_str(payload)
            .map_err(|e| CoachError::MalformedFrame(format!("{}: {}", e, truncate(payload))))?;

        let event = match envelope.kind.as_str() {
            "operation" => {
                let op: Operation = serde_json::from_value(envelope.data).map_err(|e| {
                    CoachError::MalformedFrame(format!("operation payload: {}", e))
                })?;
                StreamEvent::Operation(op)
            }
            "final_message" => {
                let data: FinalMessageData = serde_json::from_value(envelope.data).map_err(|e| {
                    CoachError::MalformedFrame(format!("final_message payload: {}", e))
                })?;
                StreamEvent::FinalMessage {
                    message: data.message,
                    session_id: data.session_id.filter(|id| !id.trim().is_empty()),
                }
            }
            "done" => StreamEvent::Done,
            "error" => StreamEvent::Error {
                message: error_message(&envelope.data),
            },
            other => StreamEvent::Unknown(other.to_string()),
        };
        Ok(event)
    }
}

/// `data.error`, then `data.message`, then a bare string, else the fallback.
fn error_message(data: &serde_json::Value) -> String {
    let candidate = data["error"]
        .as_str()
        .or_else(|| data["message"].as_str())
        .or_else(|| data.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    candidate.unwrap_or(ERROR_FALLBACK).to_string()
}

fn truncate(payload: &str) -> String {
    const MAX: usize = 120;
    match payload.char_indices().nth(MAX) {
        Some((i, _)) => format!("{}...", &payload[..i]),
        None => payload.to_string(),
    }
}
