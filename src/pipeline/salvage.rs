//! Structured parse of a `data:` payload, with best-effort salvage of malformed events.
//!
//! Everything heuristic about recovering broken events lives here so the decoder state
//! machine never has to change when the heuristics do.

use crate::types::StreamFrame;
use once_cell::sync::Lazy;
use regex::Regex;

static TEXT_FIELD: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#""text"\s*:\s*"((?:[^"\\]|\\.)*)""#).ok());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    Frame(StreamFrame),
    /// Payload was not valid JSON but a quoted text fragment could be recovered.
    Salvaged(String),
    Unusable,
}

/// Only JSON objects count as events; anything else falls through to salvage.
pub fn parse_event(payload: &str) -> ParsedEvent {
    let structured = serde_json::from_str::<serde_json::Value>(payload)
        .ok()
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value::<StreamFrame>(v).ok());
    match structured {
        Some(frame) => ParsedEvent::Frame(frame),
        None => match salvage_text(payload) {
            Some(text) => ParsedEvent::Salvaged(text),
            None => ParsedEvent::Unusable,
        },
    }
}

/// Pull the first `"text": "..."` value out of a broken payload, unescaping it when possible.
pub fn salvage_text(payload: &str) -> Option<String> {
    let re = TEXT_FIELD.as_ref()?;
    let raw = re.captures(payload)?.get(1)?.as_str();
    let text = serde_json::from_str::<String>(&format!("\"{}\"", raw))
        .unwrap_or_else(|_| raw.to_string());
    Some(text)
}
