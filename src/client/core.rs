use super::dispatch::{Dispatched, Dispatcher};
use super::gate::ClientSlot;
use super::policy::ErrorClassifier;
use super::types::{ReplyStream, ReplyUpdate, SendStats};
use crate::pipeline::{RetryController, StreamDecoder, TextObserver};
use crate::store::TranscriptStore;
use crate::types::{CompletionRequest, Message};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Chat client: transcript access plus the message-delivery pipeline.
///
/// Cheap to clone; clones share the store, the backend slot and the pipeline.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) store: Arc<TranscriptStore>,
    pub(crate) slot: Arc<ClientSlot>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) decoder: StreamDecoder,
    pub(crate) retry: RetryController,
    pub(crate) classifier: ErrorClassifier,
}

struct AttemptOutcome {
    text: String,
    streamed: bool,
    request_id: String,
}

/// Forwards decoder snapshots into the reply channel.
struct ChannelObserver {
    tx: mpsc::UnboundedSender<ReplyUpdate>,
}

impl TextObserver for ChannelObserver {
    fn on_text(&mut self, accumulated: &str) -> anyhow::Result<()> {
        self.tx
            .send(ReplyUpdate::Text(accumulated.to_string()))
            .map_err(|_| anyhow::anyhow!("reply receiver dropped"))
    }
}

impl ChatClient {
    pub(crate) fn from_inner(inner: ClientInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn builder() -> super::builder::ChatClientBuilder {
        super::builder::ChatClientBuilder::new()
    }

    /// Slot the completion backend is (or will be) installed into.
    pub fn slot(&self) -> &Arc<ClientSlot> {
        &self.inner.slot
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.inner.classifier
    }

    pub fn store(&self) -> &Arc<TranscriptStore> {
        &self.inner.store
    }

    pub async fn history(&self) -> Vec<Message> {
        self.inner.store.history().await
    }

    /// Persist a message; the returned copy carries its assigned `seq`.
    pub async fn save_message(&self, message: Message) -> Result<Message> {
        self.inner.store.save_message(message).await
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.inner.store.clear().await
    }

    /// Deliver `text` and return the final reply text.
    ///
    /// The observer sees every accumulated snapshot; its errors are logged and ignored.
    pub async fn send_message(
        &self,
        text: &str,
        observer: Option<&mut dyn TextObserver>,
    ) -> Result<String> {
        Ok(self.send_message_with_stats(text, observer).await?.0)
    }

    pub async fn send_message_with_stats(
        &self,
        text: &str,
        mut observer: Option<&mut dyn TextObserver>,
    ) -> Result<(String, SendStats)> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let delivery = self.deliver(text, tx);
        tokio::pin!(delivery);

        let result = loop {
            tokio::select! {
                biased;
                Some(update) = rx.recv() => forward(&mut observer, update),
                res = &mut delivery => break res,
            }
        };
        while let Ok(update) = rx.try_recv() {
            forward(&mut observer, update);
        }
        result
    }

    /// Deliver `text` on a background task, yielding updates as they happen.
    pub fn stream_message(&self, text: &str) -> ReplyStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.clone();
        let text = text.to_string();
        let task = tokio::spawn(async move {
            let last = match client.deliver(&text, tx.clone()).await {
                Ok((text, stats)) => ReplyUpdate::Done { text, stats },
                Err(e) => ReplyUpdate::Failed(e),
            };
            let _ = tx.send(last);
        });
        ReplyStream::new(rx, task)
    }

    /// Retry loop around single attempts; progress goes to `tx`.
    async fn deliver(
        &self,
        text: &str,
        tx: mpsc::UnboundedSender<ReplyUpdate>,
    ) -> Result<(String, SendStats)> {
        let started = std::time::Instant::now();
        let inner = &self.inner;
        let attempt_tx = tx.clone();

        let retried = inner
            .retry
            .with_retry_notify(
                move |attempt| {
                    let tx = attempt_tx.clone();
                    async move { inner.attempt_once(text, attempt, tx).await }
                },
                |e| inner.classifier.is_retryable(e),
                |state, delay, _| {
                    let _ = tx.send(ReplyUpdate::Retrying {
                        attempt: state.attempt + 1,
                        delay,
                    });
                },
            )
            .await?;

        let stats = SendStats {
            attempts: retried.attempts,
            streamed: retried.value.streamed,
            duration_ms: started.elapsed().as_millis() as u64,
            request_id: retried.value.request_id,
        };
        info!(
            request_id = stats.request_id.as_str(),
            attempts = stats.attempts,
            streamed = stats.streamed,
            duration_ms = stats.duration_ms,
            "reply delivered"
        );
        Ok((retried.value.text, stats))
    }
}

impl ClientInner {
    async fn attempt_once(
        &self,
        text: &str,
        attempt: u32,
        tx: mpsc::UnboundedSender<ReplyUpdate>,
    ) -> Result<AttemptOutcome> {
        let request = CompletionRequest::new(text);
        info!(
            request_id = request.request_id.as_str(),
            attempt,
            "dispatching message"
        );
        let (reply, streamed) = match self.dispatcher.dispatch_with_id(&request).await? {
            Dispatched::Text(reply) => (reply, false),
            Dispatched::Stream(body) => {
                let mut observer = ChannelObserver { tx };
                let reply = self.decoder.decode(body, Some(&mut observer)).await?;
                (reply, true)
            }
        };
        if reply.trim().is_empty() {
            return Err(Error::EmptyResponse);
        }
        Ok(AttemptOutcome {
            text: reply,
            streamed,
            request_id: request.request_id,
        })
    }
}

fn forward(observer: &mut Option<&mut dyn TextObserver>, update: ReplyUpdate) {
    let Some(obs) = observer.as_deref_mut() else {
        return;
    };
    let outcome = match update {
        ReplyUpdate::Text(text) => obs.on_text(&text),
        ReplyUpdate::Retrying { attempt, delay } => obs.on_retry(attempt, delay),
        ReplyUpdate::Done { .. } | ReplyUpdate::Failed(_) => Ok(()),
    };
    if let Err(e) = outcome {
        warn!(error = %e, "text observer failed, continuing");
    }
}
