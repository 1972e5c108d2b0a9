//! Shared fakes for the integration tests.

#![allow(dead_code)]

use ai_chat_client::client::Reachability;
use ai_chat_client::transport::{CompletionBackend, RemoteReply};
use ai_chat_client::types::CompletionRequest;
use ai_chat_client::{BoxStream, ClientConfig, Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

type Responder = Box<dyn Fn(u32) -> Result<RemoteReply> + Send + Sync>;

/// Backend answering each call with `responder(call_index)`.
pub struct Scripted {
    responder: Responder,
    calls: Arc<AtomicU32>,
    seen: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl Scripted {
    pub fn new(responder: impl Fn(u32) -> Result<RemoteReply> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Arc::new(AtomicU32::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }

    pub fn seen(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        self.seen.clone()
    }
}

#[async_trait]
impl CompletionBackend for Scripted {
    async fn complete(&self, request: &CompletionRequest) -> Result<RemoteReply> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());
        (self.responder)(call)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Backend that never answers. Flags when it was called and when its call was dropped.
#[derive(Default)]
pub struct Hanging {
    pub started: Arc<AtomicBool>,
    pub cancelled: Arc<AtomicBool>,
}

struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CompletionBackend for Hanging {
    async fn complete(&self, _request: &CompletionRequest) -> Result<RemoteReply> {
        let _guard = SetOnDrop(self.cancelled.clone());
        self.started.store(true, Ordering::SeqCst);
        std::future::pending::<Result<RemoteReply>>().await
    }

    fn name(&self) -> &'static str {
        "hanging"
    }
}

/// Reachability check that never settles, so every probe ends up degraded.
#[derive(Default)]
pub struct StalledProbe {
    pub checks: Arc<AtomicU32>,
}

#[async_trait]
impl Reachability for StalledProbe {
    async fn check(&self, _url: &str) -> Result<()> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<Result<()>>().await
    }
}

pub fn body(value: serde_json::Value) -> Result<RemoteReply> {
    Ok(RemoteReply::Body(value))
}

pub fn chunks(parts: &[&'static str]) -> BoxStream<'static, Bytes> {
    let items: Vec<Result<Bytes>> = parts
        .iter()
        .map(|p| Ok(Bytes::from_static(p.as_bytes())))
        .collect();
    Box::pin(futures::stream::iter(items))
}

pub fn stream(parts: &[&'static str]) -> Result<RemoteReply> {
    Ok(RemoteReply::Stream(chunks(parts)))
}

pub const STORY: &[&str] = &[
    "data: {\"text\":\"Once\"}\n",
    "data: {\"text\":\" upon\"}\n",
    "data: {\"text\":\" a time\",\"complete\":true}\n",
];

/// Default config minus the network probe.
pub fn offline_safe_config() -> ClientConfig {
    ClientConfig {
        probe_url: None,
        ..ClientConfig::default()
    }
}

pub fn network_error() -> Error {
    Error::remote("Network request failed")
}
