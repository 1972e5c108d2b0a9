//! 流式回复处理：把分块字节流解码为累积文本。
//!
//! # Stream Decoding Pipeline
//!
//! Turns the chunked body of a streamed reply into the final reply text, reporting every
//! intermediate snapshot to an optional [`TextObserver`].
//!
//! ```text
//! Raw Bytes → idle bound → LineDecoder → StreamSignal → StreamAccumulator → final text
//!     │            │             │                              │
//!   HTTP     StreamTimeout   framing, parse,              snapshots to the
//!                            salvage                      observer
//! ```
//!
//! ## Submodules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`decode`] | Line framing and per-line classification |
//! | [`salvage`] | Structured event parse plus best-effort recovery of broken events |
//! | [`accumulate`] | Accumulated text for one in-flight stream |
//! | [`retry`] | Retry controller with exponential backoff |
//!
//! Decoder states are Reading → Done | Failed | TimedOut. A malformed event never aborts
//! the stream; only an explicit failure signal, a source error or the inactivity bound do.

pub mod accumulate;
pub mod decode;
pub mod retry;
pub mod salvage;

pub use accumulate::StreamAccumulator;
pub use decode::LineDecoder;
pub use retry::{Retried, RetryController, RetryState};
pub use salvage::{parse_event, salvage_text, ParsedEvent};

use crate::types::StreamSignal;
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::time::Duration;
use tracing::{debug, warn};

/// Receives incremental reply text.
///
/// `on_text` is called with the full accumulated text (never a delta), so within one
/// attempt successive snapshots only grow. Errors are logged and swallowed by the caller.
pub trait TextObserver: Send {
    fn on_text(&mut self, accumulated: &str) -> anyhow::Result<()>;

    /// A retry is about to start; the next snapshot begins from empty text.
    fn on_retry(&mut self, _attempt: u32, _delay: Duration) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<F> TextObserver for F
where
    F: FnMut(&str) -> anyhow::Result<()> + Send,
{
    fn on_text(&mut self, accumulated: &str) -> anyhow::Result<()> {
        self(accumulated)
    }
}

/// Fail any read that takes longer than `idle` with [`Error::StreamTimeout`].
///
/// The source is dropped as soon as the bound trips, which cancels the pending read.
pub fn with_idle_timeout(input: BoxStream<'static, Bytes>, idle: Duration) -> BoxStream<'static, Bytes> {
    let idle_ms = idle.as_millis() as u64;
    let stream = stream::unfold(Some(input), move |state| async move {
        let mut input = state?;
        match tokio::time::timeout(idle, input.next()).await {
            Ok(Some(item)) => Some((item, Some(input))),
            Ok(None) => None,
            Err(_) => {
                drop(input);
                Some((Err(Error::StreamTimeout { idle_ms }), None))
            }
        }
    });
    Box::pin(stream)
}

/// Stream decoder: framing, event parsing, accumulation and the inactivity bound.
#[derive(Debug, Clone)]
pub struct StreamDecoder {
    lines: LineDecoder,
    idle_timeout: Duration,
}

impl StreamDecoder {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            lines: LineDecoder::new(),
            idle_timeout,
        }
    }

    pub fn with_line_decoder(mut self, lines: LineDecoder) -> Self {
        self.lines = lines;
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Consume `body` until a completion signal, a failure, end of input or the
    /// inactivity bound, and return the accumulated text.
    pub async fn decode(
        &self,
        body: BoxStream<'static, Bytes>,
        mut observer: Option<&mut dyn TextObserver>,
    ) -> Result<String> {
        let bounded = with_idle_timeout(body, self.idle_timeout);
        let mut signals = self.lines.decode_stream(bounded);
        let mut acc = StreamAccumulator::new();

        while let Some(signal) = signals.next().await {
            match signal? {
                StreamSignal::Text(fragment) => {
                    let snapshot = acc.push(&fragment);
                    if let Some(obs) = observer.as_deref_mut() {
                        if let Err(e) = obs.on_text(snapshot) {
                            warn!(error = %e, "text observer failed, continuing");
                        }
                    }
                }
                StreamSignal::Complete => {
                    debug!(chars = acc.text().len(), "stream completed");
                    return Ok(acc.into_text());
                }
                StreamSignal::Failed(message) => {
                    debug!(error = message.as_str(), "stream reported failure");
                    return Err(Error::Remote {
                        message,
                        status: None,
                    });
                }
            }
        }

        debug!(
            received_any_data = acc.received_any_data(),
            "stream ended without completion signal"
        );
        acc.finish_at_eof()
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::config::ClientConfig::default().stream_idle_timeout_ms))
    }
}
