use super::{CompletionBackend, RemoteReply, TransportError};
use crate::config::ClientConfig;
use crate::types::CompletionRequest;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use keyring::Entry;
use reqwest::header::{HeaderMap, CONTENT_TYPE, TRANSFER_ENCODING};
use reqwest::{Proxy, StatusCode};
use std::env;
use std::time::Duration;
use tracing::info;

const KEYRING_SERVICE: &str = "ai-chat-client";
const REQUEST_ID_HEADER: &str = "x-chat-request-id";

/// Completion backend speaking JSON-over-HTTP, with SSE/NDJSON streaming replies.
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: url::Url,
    api_key: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let raw = config.endpoint_url.as_deref().ok_or_else(|| {
            Error::configuration_with_context(
                "endpoint_url is required for the HTTP backend",
                ErrorContext::new()
                    .with_field_path("endpoint_url")
                    .with_source("http_backend"),
            )
        })?;
        let endpoint = url::Url::parse(raw).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid endpoint url: {}", e),
                ErrorContext::new()
                    .with_field_path("endpoint_url")
                    .with_details(raw.to_string())
                    .with_source("http_backend"),
            )
        })?;

        // No overall request timeout: the dispatcher races the call itself and streamed
        // bodies are bounded by the decoder's inactivity timeout.
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.dispatch_timeout_ms))
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Some(proxy_url) = &config.proxy_url {
            let proxy = Proxy::all(proxy_url).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid proxy url: {}", e),
                    ErrorContext::new()
                        .with_field_path("proxy_url")
                        .with_details(proxy_url.clone())
                        .with_source("http_backend"),
                )
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        let api_key = config.api_key.clone().or_else(Self::lookup_api_key);

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    fn lookup_api_key() -> Option<String> {
        // 1. Try Keyring
        if let Ok(entry) = Entry::new(KEYRING_SERVICE, "api-key") {
            if let Ok(key) = entry.get_password() {
                return Some(key);
            }
        }

        // 2. Try Environment Variable
        env::var("CHAT_API_KEY").ok().filter(|k| !k.trim().is_empty())
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    async fn error_from_response(resp: reqwest::Response) -> Error {
        let status = resp.status();
        let retry_after_ms = retry_after_ms(resp.headers());
        let body = resp.text().await.unwrap_or_default();
        let message = error_text_from_body(&body);

        if status == StatusCode::TOO_MANY_REQUESTS {
            Error::RateLimited { retry_after_ms }
        } else if status.is_server_error() {
            Error::ServiceUnavailable {
                status: status.as_u16(),
                message,
            }
        } else {
            Error::Remote {
                message,
                status: Some(status.as_u16()),
            }
        }
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<RemoteReply> {
        let mut req = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .header("accept", "text/event-stream, application/json")
            .header(REQUEST_ID_HEADER, request.request_id.as_str());

        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        let status = resp.status();
        if !status.is_success() {
            let err = Self::error_from_response(resp).await;
            info!(
                http_status = status.as_u16(),
                request_id = request.request_id.as_str(),
                error = %err,
                "completion request failed"
            );
            return Err(err);
        }

        if is_streaming_response(resp.headers()) {
            let body = resp
                .bytes_stream()
                .map_err(|e| Error::Transport(TransportError::Http(e)));
            return Ok(RemoteReply::Stream(Box::pin(body)));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        Ok(RemoteReply::Body(serde_json::Value::String(text)))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// A reply is consumed incrementally when the server announces an event stream or NDJSON,
/// or sends a chunked body that is not plain JSON.
fn is_streaming_response(headers: &HeaderMap) -> bool {
    let content_type = header_first(headers, &[CONTENT_TYPE.as_str()])
        .unwrap_or_default()
        .to_ascii_lowercase();
    if content_type.contains("text/event-stream") || content_type.contains("ndjson") {
        return true;
    }
    let chunked = header_first(headers, &[TRANSFER_ENCODING.as_str()])
        .map(|v| v.to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false);
    chunked && !content_type.contains("json")
}

/// Extract the first matching header value from a list of header names.
fn header_first(headers: &HeaderMap, names: &[&str]) -> Option<String> {
    for name in names {
        if let Some(v) = headers.get(*name) {
            if let Ok(s) = v.to_str() {
                let s = s.trim();
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            }
        }
    }
    None
}

/// Best-effort parsing of `Retry-After: <seconds>`.
fn retry_after_ms(headers: &HeaderMap) -> Option<u64> {
    let raw = header_first(headers, &["retry-after"])?;
    let secs: u64 = raw.parse().ok()?;
    Some(secs.saturating_mul(1000))
}

/// Prefer a JSON `error` field (string, or object with `message`) over the raw body.
fn error_text_from_body(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let from_json = parsed.as_ref().and_then(|v| match v.get("error") {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(obj) => obj
            .get("message")
            .and_then(|m| m.as_str())
            .map(|s| s.to_string()),
        None => None,
    });
    match from_json {
        Some(s) => s,
        None if body.trim().is_empty() => "no response body".to_string(),
        None => body.trim().to_string(),
    }
}
