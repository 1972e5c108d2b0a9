//! Conversation turn handling on top of [`ChatClient`].
//!
//! The session keeps a display copy of the transcript that can hold an in-flight AI
//! placeholder; the store only ever sees finished messages.

use super::core::ChatClient;
use super::policy::ErrorClassifier;
use crate::pipeline::TextObserver;
use crate::types::{Message, Transcript};
use crate::{Error, Result};
use std::time::Duration;
use tracing::{error, warn};

pub const EMPTY_RESPONSE_NOTICE: &str =
    "The AI service returned an empty response. This sometimes happens - please try again.";
pub const UNEXPECTED_FORMAT_NOTICE: &str = "Received unexpected response format. Please try again.";
pub const GENERIC_NOTICE: &str = "AI service error. Please try again later.";
const MAX_NOTICE_CHARS: usize = 80;

/// User-facing failure description, optionally with a manual retry action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    /// Original user text to resend when the user picks "Try Again".
    pub retry_text: Option<String>,
}

impl Notice {
    pub fn for_error(err: &Error, classifier: &ErrorClassifier, original_text: &str) -> Self {
        let root = err.root();
        let empty = matches!(root, Error::EmptyResponse | Error::EmptyStream);
        let unexpected_format = matches!(root, Error::MalformedResponse(_));
        let message = err.to_string();

        if empty || unexpected_format || classifier.is_retryable(root) {
            let text = if empty {
                EMPTY_RESPONSE_NOTICE.to_string()
            } else if unexpected_format {
                UNEXPECTED_FORMAT_NOTICE.to_string()
            } else {
                message
            };
            return Self {
                text,
                retry_text: Some(original_text.to_string()),
            };
        }

        let text = if message.chars().count() > MAX_NOTICE_CHARS {
            GENERIC_NOTICE.to_string()
        } else {
            message
        };
        Self {
            text,
            retry_text: None,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.retry_text.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{}", .notice.text)]
pub struct SendFailure {
    pub notice: Notice,
    #[source]
    pub error: Error,
}

/// Wraps the caller's observer and mirrors snapshots into the placeholder.
struct PlaceholderObserver<'a, 'o> {
    display: &'a mut Transcript,
    placeholder_id: &'a str,
    outer: Option<&'a mut (dyn TextObserver + 'o)>,
}

impl TextObserver for PlaceholderObserver<'_, '_> {
    fn on_text(&mut self, accumulated: &str) -> anyhow::Result<()> {
        self.display
            .set_content(self.placeholder_id, accumulated, true);
        match self.outer.as_deref_mut() {
            Some(outer) => outer.on_text(accumulated),
            None => Ok(()),
        }
    }

    fn on_retry(&mut self, attempt: u32, delay: Duration) -> anyhow::Result<()> {
        self.display.set_content(self.placeholder_id, "", true);
        match self.outer.as_deref_mut() {
            Some(outer) => outer.on_retry(attempt, delay),
            None => Ok(()),
        }
    }
}

pub struct ChatSession {
    client: ChatClient,
    display: Transcript,
}

impl ChatSession {
    /// Load stored history into the display copy.
    pub async fn load(client: ChatClient) -> Self {
        let display = Transcript::from_messages(client.history().await);
        Self { client, display }
    }

    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    pub fn messages(&self) -> &[Message] {
        self.display.messages()
    }

    /// Send one user message and return the finished AI reply.
    ///
    /// Blank input is ignored (`Ok(None)`). On failure the placeholder is gone from the
    /// display copy and the returned [`SendFailure`] says what to show the user.
    pub async fn submit(
        &mut self,
        text: &str,
        observer: Option<&mut dyn TextObserver>,
    ) -> std::result::Result<Option<Message>, SendFailure> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let user = Message::user(text);
        self.display.upsert(user.clone());
        match self.client.save_message(user).await {
            Ok(saved) => self.display.upsert(saved),
            Err(e) => {
                error!(error = %e, "failed to save user message");
                return Err(self.failure(e, text));
            }
        }

        let placeholder = Message::placeholder();
        let placeholder_id = placeholder.id.clone();
        self.display.upsert(placeholder.clone());

        let outcome = {
            let mut mirror = PlaceholderObserver {
                display: &mut self.display,
                placeholder_id: &placeholder_id,
                outer: observer,
            };
            self.client.send_message(text, Some(&mut mirror)).await
        };

        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "chat send failed");
                self.display.remove(&placeholder_id);
                return Err(self.failure(e, text));
            }
        };

        let finished = placeholder.finalize(reply);
        let finished = match self.client.save_message(finished.clone()).await {
            Ok(saved) => saved,
            Err(e) => {
                warn!(error = %e, "failed to save AI reply, keeping it on screen only");
                finished
            }
        };
        self.display.upsert(finished.clone());
        Ok(Some(finished))
    }

    /// Resend the most recent user message. `Ok(None)` when there is none.
    pub async fn retry_last(
        &mut self,
        observer: Option<&mut dyn TextObserver>,
    ) -> std::result::Result<Option<Message>, SendFailure> {
        let Some(text) = self.display.last_user_message().map(|m| m.content.clone()) else {
            return Ok(None);
        };
        self.submit(&text, observer).await
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.client.clear_history().await?;
        self.display.clear();
        Ok(())
    }

    fn failure(&self, error: Error, text: &str) -> SendFailure {
        SendFailure {
            notice: Notice::for_error(&error, self.client.classifier(), text),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_follow_failure_class() {
        let c = ErrorClassifier::default();

        let n = Notice::for_error(&Error::EmptyResponse, &c, "hi");
        assert_eq!(n.text, EMPTY_RESPONSE_NOTICE);
        assert_eq!(n.retry_text.as_deref(), Some("hi"));

        let n = Notice::for_error(&Error::malformed("not an object"), &c, "hi");
        assert_eq!(n.text, UNEXPECTED_FORMAT_NOTICE);
        assert!(n.can_retry());

        let exhausted = Error::RetriesExhausted {
            attempts: 4,
            source: Box::new(Error::Offline),
        };
        let n = Notice::for_error(&exhausted, &c, "hi");
        assert!(n.can_retry());
        assert!(n.text.contains("4 attempts"));

        let n = Notice::for_error(&Error::remote("Invalid API key"), &c, "hi");
        assert_eq!(n.text, "Remote error: Invalid API key");
        assert!(!n.can_retry());

        let long = Error::remote("x".repeat(120));
        assert_eq!(Notice::for_error(&long, &c, "hi").text, GENERIC_NOTICE);
    }
}
