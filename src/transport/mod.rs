//! Remote completion transport.
//!
//! [`CompletionBackend`] is the seam between the dispatcher and whatever actually talks to
//! the AI service. [`HttpBackend`] is the production implementation; tests install fakes.

pub mod http;

pub use http::HttpBackend;

use crate::types::CompletionRequest;
use crate::{BoxStream, Result};
use async_trait::async_trait;
use bytes::Bytes;

/// Settled result of a remote call.
pub enum RemoteReply {
    /// Chunked body, to be consumed by the stream decoder.
    Stream(BoxStream<'static, Bytes>),
    /// Complete payload. A `Value::String` is parsed as JSON by the dispatcher.
    Body(serde_json::Value),
}

impl std::fmt::Debug for RemoteReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteReply::Stream(_) => f.write_str("RemoteReply::Stream(..)"),
            RemoteReply::Body(v) => f.debug_tuple("RemoteReply::Body").field(v).finish(),
        }
    }
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<RemoteReply>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Connection, timeout and request-send failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            TransportError::Other(_) => false,
        }
    }
}
