//! Wire-level payloads and decoded stream signals.

use serde::{Deserialize, Serialize};

/// Body of the remote completion call: `{ "message": "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub message: String,
    /// Client-side correlation id; sent as a header, never in the body.
    #[serde(skip)]
    pub request_id: String,
}

impl CompletionRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Single-shot reply: `{ success, response?, error? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One `data:` event of a streamed reply: `{ text?, success?, complete?, error? }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamFrame {
    /// Failure flag: an error text, or an explicit `success: false`.
    pub fn failure(&self) -> Option<String> {
        match (&self.error, self.success) {
            (Some(e), _) => Some(e.clone()),
            (None, Some(false)) => Some("AI service reported a failure".to_string()),
            _ => None,
        }
    }

    pub fn is_terminal_success(&self) -> bool {
        self.complete == Some(true) || self.success == Some(true)
    }
}

/// Decoded unit of a streamed reply, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    /// A text fragment to append.
    Text(String),
    /// Completion: `complete`/`success` flag, `event: done`, or the `[DONE]` keyword.
    Complete,
    /// Failure: error text / `success: false`, or `event: error`.
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_only_carries_message() {
        let req = CompletionRequest::new("hello");
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body, serde_json::json!({ "message": "hello" }));
        assert!(!req.request_id.is_empty());
    }

    #[test]
    fn frame_flags() {
        let f: StreamFrame = serde_json::from_str(r#"{"text":" a time","complete":true}"#).unwrap();
        assert!(f.is_terminal_success());
        assert_eq!(f.failure(), None);

        let f: StreamFrame = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert!(f.failure().is_some());

        let f: StreamFrame = serde_json::from_str(r#"{"error":"quota","text":"x"}"#).unwrap();
        assert_eq!(f.failure().as_deref(), Some("quota"));

        let f: StreamFrame = serde_json::from_str(r#"{"error":null,"text":"x"}"#).unwrap();
        assert_eq!(f.failure(), None);
    }
}
