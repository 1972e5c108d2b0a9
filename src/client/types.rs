use crate::Error;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Per-send stats, for logging and diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendStats {
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// Whether the successful attempt received a streamed reply.
    pub streamed: bool,
    pub duration_ms: u64,
    /// Request id of the successful attempt (`x-chat-request-id`).
    pub request_id: String,
}

/// One item of a [`ReplyStream`].
#[derive(Debug)]
pub enum ReplyUpdate {
    /// Full accumulated text so far.
    Text(String),
    /// A retry is about to start after `delay`; text restarts from empty.
    Retrying { attempt: u32, delay: Duration },
    Done { text: String, stats: SendStats },
    Failed(Error),
}

impl ReplyUpdate {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReplyUpdate::Done { .. } | ReplyUpdate::Failed(_))
    }
}

/// Incremental reply of one send, backed by a spawned task.
///
/// Ends after a `Done` or `Failed` item. Dropping the stream aborts the task, which
/// cancels whatever it was waiting on.
pub struct ReplyStream {
    rx: mpsc::UnboundedReceiver<ReplyUpdate>,
    task: JoinHandle<()>,
}

impl ReplyStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<ReplyUpdate>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    /// Stop the send now. Equivalent to dropping the stream.
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Stream for ReplyStream {
    type Item = ReplyUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for ReplyStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}
