use crate::config::DEFAULT_RETRYABLE_PATTERNS;
use crate::Error;

/// Outcome of classifying a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    Terminal,
}

/// Retryable-vs-terminal classification at the retry boundary.
///
/// Structured variants decide by themselves. Only unstructured failures (remote error
/// text, opaque transport errors) fall back to matching the configured keyword patterns.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    patterns: Vec<String>,
}

impl ErrorClassifier {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn classify(&self, err: &Error) -> ErrorClass {
        if self.is_retryable(err) {
            ErrorClass::Retryable
        } else {
            ErrorClass::Terminal
        }
    }

    pub fn is_retryable(&self, err: &Error) -> bool {
        match err {
            Error::Offline
            | Error::ConnectionDegraded { .. }
            | Error::SdkUnavailable { .. }
            | Error::RequestTimeout { .. }
            | Error::StreamTimeout { .. }
            | Error::MalformedResponse(_) => true,
            Error::ServiceUnavailable { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            Error::Transport(t) => t.is_transient() || self.matches_text(&t.to_string()),
            Error::Remote { message, .. } => self.matches_text(message),
            Error::EmptyStream | Error::EmptyResponse | Error::RateLimited { .. } => false,
            _ => false,
        }
    }

    fn matches_text(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.patterns.iter().any(|p| lower.contains(p.as_str()))
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RETRYABLE_PATTERNS.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;

    #[test]
    fn structured_variants() {
        let c = ErrorClassifier::default();
        assert!(c.is_retryable(&Error::Offline));
        assert!(c.is_retryable(&Error::ConnectionDegraded { timeout_ms: 3000 }));
        assert!(c.is_retryable(&Error::SdkUnavailable { waited_ms: 10_000 }));
        assert!(c.is_retryable(&Error::StreamTimeout { idle_ms: 60_000 }));
        assert!(c.is_retryable(&Error::malformed("not an object")));
        assert_eq!(c.classify(&Error::EmptyStream), ErrorClass::Terminal);
        assert!(!c.is_retryable(&Error::EmptyResponse));
        assert!(!c.is_retryable(&Error::RateLimited { retry_after_ms: None }));
    }

    #[test]
    fn service_status_codes() {
        let c = ErrorClassifier::default();
        for status in [500, 502, 503, 504] {
            assert!(c.is_retryable(&Error::ServiceUnavailable {
                status,
                message: "x".into()
            }));
        }
        assert!(!c.is_retryable(&Error::ServiceUnavailable {
            status: 501,
            message: "x".into()
        }));
    }

    #[test]
    fn unstructured_text_uses_patterns() {
        let c = ErrorClassifier::default();
        assert!(c.is_retryable(&Error::remote("Network request failed")));
        assert!(c.is_retryable(&Error::remote("upstream returned 503")));
        assert!(c.is_retryable(&Error::remote("model not loaded yet")));
        assert!(!c.is_retryable(&Error::remote("Invalid API key")));
        assert!(!c.is_retryable(&Error::Transport(TransportError::Other(
            "certificate rejected".into()
        ))));

        let custom = ErrorClassifier::new(["Overloaded"]);
        assert!(custom.is_retryable(&Error::remote("server overloaded")));
        assert!(!custom.is_retryable(&Error::remote("network down")));
    }
}
