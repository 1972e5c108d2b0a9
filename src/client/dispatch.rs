//! Dispatcher: probe, gate, then one remote call raced against a timeout.

use super::connectivity::{Connectivity, ConnectivityProber};
use super::gate::RemoteClientGate;
use crate::transport::RemoteReply;
use crate::types::{CompletionRequest, CompletionResponse};
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const UNKNOWN_REMOTE_ERROR: &str = "Unknown error from AI service";

/// What a single dispatch produced.
pub enum Dispatched {
    /// Final reply text of a single-shot response.
    Text(String),
    /// Chunked body for the stream decoder.
    Stream(BoxStream<'static, Bytes>),
}

impl std::fmt::Debug for Dispatched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dispatched::Text(t) => f.debug_tuple("Dispatched::Text").field(t).finish(),
            Dispatched::Stream(_) => f.write_str("Dispatched::Stream(..)"),
        }
    }
}

pub struct Dispatcher {
    prober: ConnectivityProber,
    gate: RemoteClientGate,
    ready_timeout: Duration,
    dispatch_timeout: Duration,
    fail_on_degraded: bool,
}

impl Dispatcher {
    pub fn new(
        prober: ConnectivityProber,
        gate: RemoteClientGate,
        ready_timeout: Duration,
        dispatch_timeout: Duration,
    ) -> Self {
        Self {
            prober,
            gate,
            ready_timeout,
            dispatch_timeout,
            fail_on_degraded: true,
        }
    }

    pub fn fail_on_degraded(mut self, enable: bool) -> Self {
        self.fail_on_degraded = enable;
        self
    }

    pub fn gate(&self) -> &RemoteClientGate {
        &self.gate
    }

    pub async fn dispatch(&self, user_text: &str) -> Result<Dispatched> {
        self.dispatch_with_id(&CompletionRequest::new(user_text)).await
    }

    /// Same as [`dispatch`](Self::dispatch) with a caller-built request (and request id).
    pub async fn dispatch_with_id(&self, request: &CompletionRequest) -> Result<Dispatched> {
        match self.prober.probe().await {
            Connectivity::Offline => return Err(Error::Offline),
            Connectivity::Degraded if self.fail_on_degraded => {
                return Err(Error::ConnectionDegraded {
                    timeout_ms: self.prober.timeout().as_millis() as u64,
                })
            }
            Connectivity::Degraded => {
                warn!("connectivity probe timed out, dispatching anyway");
            }
            Connectivity::Ok => {}
        }

        let backend = self.gate.wait_until_ready(self.ready_timeout).await?;

        let started = std::time::Instant::now();
        let reply = match tokio::time::timeout(self.dispatch_timeout, backend.complete(request)).await
        {
            Ok(reply) => reply?,
            Err(_) => {
                info!(
                    request_id = request.request_id.as_str(),
                    timeout_ms = self.dispatch_timeout.as_millis() as u64,
                    "dispatch timed out, abandoning call"
                );
                return Err(Error::RequestTimeout {
                    timeout_ms: self.dispatch_timeout.as_millis() as u64,
                });
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match reply {
            RemoteReply::Stream(body) => {
                info!(
                    request_id = request.request_id.as_str(),
                    backend = backend.name(),
                    duration_ms,
                    "streaming reply started"
                );
                Ok(Dispatched::Stream(body))
            }
            RemoteReply::Body(payload) => {
                let text = parse_single_shot(payload)?;
                info!(
                    request_id = request.request_id.as_str(),
                    backend = backend.name(),
                    duration_ms,
                    "single-shot reply received"
                );
                Ok(Dispatched::Text(text))
            }
        }
    }
}

/// Validate a single-shot payload `{ success, response?, error? }` and pull out the text.
pub fn parse_single_shot(payload: Value) -> Result<String> {
    let payload = match payload {
        Value::String(raw) => serde_json::from_str::<Value>(&raw).map_err(|e| {
            debug!(error = %e, "single-shot body is not JSON");
            Error::malformed(format!("reply is not valid JSON: {}", e))
        })?,
        other => other,
    };

    let Value::Object(obj) = payload else {
        return Err(Error::malformed("reply is not a JSON object"));
    };
    if !obj.get("success").map_or(false, Value::is_boolean) {
        return Err(Error::malformed("reply has no boolean `success` field"));
    }

    let reply: CompletionResponse = serde_json::from_value(Value::Object(obj))
        .map_err(|e| Error::malformed(format!("unexpected reply shape: {}", e)))?;

    if !reply.success {
        let message = reply
            .error
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_REMOTE_ERROR.to_string());
        return Err(Error::remote(message));
    }

    match reply.response {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(Error::EmptyResponse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_shot_success() {
        assert_eq!(
            parse_single_shot(json!({"success": true, "response": "Hello!"})).unwrap(),
            "Hello!"
        );
        assert_eq!(
            parse_single_shot(Value::String(r#"{"success":true,"response":"Hi"}"#.into())).unwrap(),
            "Hi"
        );
    }

    #[test]
    fn single_shot_failures() {
        assert!(matches!(
            parse_single_shot(Value::String("<html>oops</html>".into())),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_single_shot(json!([1, 2])),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_single_shot(json!({"response": "x"})),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_single_shot(json!({"success": "yes"})),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_single_shot(json!({"success": true, "response": 42})),
            Err(Error::MalformedResponse(_))
        ));
        match parse_single_shot(json!({"success": false})) {
            Err(Error::Remote { message, .. }) => assert_eq!(message, UNKNOWN_REMOTE_ERROR),
            other => panic!("unexpected {:?}", other),
        }
        match parse_single_shot(json!({"success": false, "error": "quota"})) {
            Err(Error::Remote { message, .. }) => assert_eq!(message, "quota"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            parse_single_shot(json!({"success": true, "response": "   "})),
            Err(Error::EmptyResponse)
        ));
        assert!(matches!(
            parse_single_shot(json!({"success": true})),
            Err(Error::EmptyResponse)
        ));
    }
}
