//! Line framing (Bytes -> StreamSignal)
//!
//! Splits the chunked body on `\n`, classifies each line and emits signals in arrival
//! order. Bytes are buffered raw so a multi-byte character split across chunks survives.

use super::salvage::{parse_event, ParsedEvent};
use crate::types::StreamSignal;
use crate::{BoxStream, Result};
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::collections::VecDeque;
use tracing::debug;

pub const DATA_PREFIX: &str = "data:";
pub const DONE_KEYWORD: &str = "[DONE]";

#[derive(Debug, Clone)]
pub struct LineDecoder {
    done_keyword: String,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self {
            done_keyword: DONE_KEYWORD.to_string(),
        }
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_done_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.done_keyword = keyword.into();
        self
    }

    /// Classify one complete line. Several signals may come out of a single event
    /// (e.g. a final fragment carrying `complete: true`).
    pub fn decode_line(&self, line: &str) -> Vec<StreamSignal> {
        let line = line.trim_end_matches('\r');
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(':') {
            return Vec::new();
        }

        if let Some(rest) = trimmed.strip_prefix(DATA_PREFIX) {
            let payload = rest.trim();
            if payload == self.done_keyword {
                return vec![StreamSignal::Complete];
            }
            return match parse_event(payload) {
                ParsedEvent::Frame(frame) => {
                    if let Some(err) = frame.failure() {
                        return vec![StreamSignal::Failed(err)];
                    }
                    let mut out = Vec::with_capacity(2);
                    if let Some(text) = frame.text.clone() {
                        out.push(StreamSignal::Text(text));
                    }
                    if frame.is_terminal_success() {
                        out.push(StreamSignal::Complete);
                    }
                    out
                }
                ParsedEvent::Salvaged(text) => {
                    debug!(payload = payload, "salvaged text from malformed stream event");
                    vec![StreamSignal::Text(text)]
                }
                ParsedEvent::Unusable => {
                    debug!(payload = payload, "skipping unparseable stream event");
                    Vec::new()
                }
            };
        }

        if let Some(name) = trimmed.strip_prefix("event:") {
            return match name.trim() {
                "done" => vec![StreamSignal::Complete],
                "error" => vec![StreamSignal::Failed(
                    "AI service reported a stream error".to_string(),
                )],
                _ => Vec::new(),
            };
        }

        if trimmed.contains(self.done_keyword.as_str()) {
            return vec![StreamSignal::Complete];
        }

        Vec::new()
    }

    /// Turn a byte stream into a signal stream. Transport errors pass through.
    pub fn decode_stream(&self, input: BoxStream<'static, Bytes>) -> BoxStream<'static, StreamSignal> {
        let decoder = self.clone();
        let state = (input, Vec::<u8>::new(), VecDeque::<StreamSignal>::new(), false);

        let stream = stream::unfold(state, move |(mut input, mut buf, mut pending, mut eof)| {
            let decoder = decoder.clone();
            async move {
                loop {
                    if let Some(sig) = pending.pop_front() {
                        return Some((Ok(sig), (input, buf, pending, eof)));
                    }

                    // A full line is buffered: decode it.
                    if let Some(idx) = buf.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = buf.drain(..=idx).collect();
                        let line = String::from_utf8_lossy(&line[..line.len() - 1]);
                        pending.extend(decoder.decode_line(&line));
                        continue;
                    }

                    if eof {
                        return None;
                    }

                    // Need more data.
                    match input.next().await {
                        Some(Ok(bytes)) => {
                            buf.extend_from_slice(&bytes);
                        }
                        Some(Err(e)) => {
                            return Some((Err::<StreamSignal, _>(e), (input, buf, pending, true)));
                        }
                        None => {
                            // EOF: the unterminated tail still counts as a line.
                            eof = true;
                            if !buf.is_empty() {
                                let tail = std::mem::take(&mut buf);
                                let line = String::from_utf8_lossy(&tail);
                                pending.extend(decoder.decode_line(&line));
                            }
                        }
                    }
                }
            }
        });

        Box::pin(stream)
    }
}

/// Convenience for tests and benches: decode every line of an in-memory body.
pub fn decode_lines(body: &str) -> Vec<StreamSignal> {
    let decoder = LineDecoder::new();
    body.lines().flat_map(|l| decoder.decode_line(l)).collect()
}
