use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for configuration and storage failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "endpoint_url", "storage.key")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "file_store")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the chat client.
///
/// The first group of variants is the delivery-pipeline taxonomy; every one of them is
/// classified at the retry boundary (see [`crate::client::ErrorClassifier`]).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Network offline: the device reports no connectivity")]
    Offline,

    #[error("Network connection degraded: probe did not complete within {timeout_ms}ms")]
    ConnectionDegraded { timeout_ms: u64 },

    #[error("Remote client not ready: unavailable after waiting {waited_ms}ms")]
    SdkUnavailable { waited_ms: u64 },

    #[error("Request timeout: no reply within {timeout_ms}ms")]
    RequestTimeout { timeout_ms: u64 },

    #[error("Stream timeout: no data for {idle_ms}ms")]
    StreamTimeout { idle_ms: u64 },

    #[error("Empty stream: input ended before any text was received")]
    EmptyStream,

    #[error("Empty response from AI service")]
    EmptyResponse,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Remote error{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Remote {
        message: String,
        status: Option<u16>,
    },

    #[error("Rate limited by AI service{}", .retry_after_ms.map(|ms| format!(", retry after {}ms", ms)).unwrap_or_default())]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Service unavailable: HTTP {status}: {message}")]
    ServiceUnavailable { status: u16, message: String },

    #[error("{source} (gave up after {attempts} attempts)")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Storage error: {message}{}", format_context(.context))]
    Storage {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn remote(message: impl Into<String>) -> Self {
        Error::Remote {
            message: message.into(),
            status: None,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedResponse(message.into())
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new storage error with structured context
    pub fn storage_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Storage {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Storage { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The innermost error, looking through [`Error::RetriesExhausted`].
    pub fn root(&self) -> &Error {
        match self {
            Error::RetriesExhausted { source, .. } => source.root(),
            other => other,
        }
    }

    /// Number of attempts recorded on an exhausted retry, if any.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Error::RetriesExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self.root(),
            Error::RequestTimeout { .. } | Error::StreamTimeout { .. }
        )
    }
}
