use super::backend::KeyValueStore;
use crate::types::{Message, Transcript};
use crate::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Persisted conversation transcript held in a single key-value slot.
///
/// The slot is read once on open and overwritten after every mutation. Mutations are
/// serialised behind one async lock so the slot always reflects the in-memory order.
pub struct TranscriptStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    transcript: Mutex<Transcript>,
}

impl TranscriptStore {
    /// Load the transcript from `key`. A missing or unreadable slot starts empty.
    pub async fn open(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let transcript = match backend.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Transcript>(&raw) {
                Ok(t) => t,
                Err(e) => {
                    warn!(key = key.as_str(), error = %e, "stored transcript is corrupt, starting empty");
                    Transcript::new()
                }
            },
            Ok(None) => Transcript::new(),
            Err(e) => {
                warn!(key = key.as_str(), error = %e, "failed to load transcript, starting empty");
                Transcript::new()
            }
        };
        debug!(
            key = key.as_str(),
            backend = backend.name(),
            messages = transcript.len(),
            "transcript loaded"
        );
        Self {
            backend,
            key,
            transcript: Mutex::new(transcript),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn history(&self) -> Vec<Message> {
        self.transcript.lock().await.messages().to_vec()
    }

    pub async fn len(&self) -> usize {
        self.transcript.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.transcript.lock().await.is_empty()
    }

    /// Append (or replace by id) and persist. Assigns `seq` = max existing + 1.
    ///
    /// Memory only changes once the slot write succeeded.
    pub async fn save_message(&self, mut message: Message) -> Result<Message> {
        let mut transcript = self.transcript.lock().await;
        message.seq = Some(transcript.next_seq());
        let mut next = transcript.clone();
        next.upsert(message.clone());
        self.persist(&next).await?;
        *transcript = next;
        Ok(message)
    }

    pub async fn clear(&self) -> Result<()> {
        let mut transcript = self.transcript.lock().await;
        let next = Transcript::new();
        self.persist(&next).await?;
        *transcript = next;
        Ok(())
    }

    /// Replace the whole transcript (initial seed data) and persist it as-is.
    pub async fn seed(&self, messages: Vec<Message>) -> Result<()> {
        let mut transcript = self.transcript.lock().await;
        let next = Transcript::from_messages(messages);
        self.persist(&next).await?;
        *transcript = next;
        Ok(())
    }

    async fn persist(&self, transcript: &Transcript) -> Result<()> {
        let raw = serde_json::to_string(transcript)?;
        self.backend.set(&self.key, &raw).await
    }
}
