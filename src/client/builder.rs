use super::connectivity::{AlwaysOnline, ConnectivityProber, HttpReachability, OnlineFlag, Reachability};
use super::core::{ChatClient, ClientInner};
use super::dispatch::Dispatcher;
use super::gate::{ClientSlot, RemoteClientGate};
use super::policy::ErrorClassifier;
use crate::config::ClientConfig;
use crate::pipeline::{RetryController, StreamDecoder};
use crate::store::{FileStore, KeyValueStore, MemoryStore, TranscriptStore};
use crate::transport::{CompletionBackend, HttpBackend};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Builder for [`ChatClient`].
///
/// Everything the pipeline talks to is injectable; unset pieces fall back to the
/// production defaults derived from [`ClientConfig`].
pub struct ChatClientBuilder {
    config: ClientConfig,
    backend: Option<Box<dyn CompletionBackend>>,
    slot: Option<Arc<ClientSlot>>,
    online: Arc<dyn OnlineFlag>,
    reachability: Option<Arc<dyn Reachability>>,
    kv_store: Option<Arc<dyn KeyValueStore>>,
    install_http_backend: bool,
}

impl ChatClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            backend: None,
            slot: None,
            online: Arc::new(AlwaysOnline),
            reachability: None,
            kv_store: None,
            install_http_backend: true,
        }
    }

    /// Start from `ClientConfig::from_env()` (YAML via `CHAT_CONFIG`, then env overrides).
    pub fn from_env() -> Result<Self> {
        Ok(Self::new().config(ClientConfig::from_env()?))
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Install this backend at build time instead of the HTTP one.
    pub fn backend(mut self, backend: Box<dyn CompletionBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Share an externally owned slot, e.g. one another task installs the backend into later.
    pub fn slot(mut self, slot: Arc<ClientSlot>) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn online_flag(mut self, flag: Arc<dyn OnlineFlag>) -> Self {
        self.online = flag;
        self
    }

    pub fn reachability(mut self, reachability: Arc<dyn Reachability>) -> Self {
        self.reachability = Some(reachability);
        self
    }

    pub fn kv_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.kv_store = Some(store);
        self
    }

    /// Leave the slot empty when no backend was given, even if an endpoint is configured.
    pub fn defer_backend(mut self) -> Self {
        self.install_http_backend = false;
        self
    }

    pub async fn build(self) -> Result<ChatClient> {
        let config = self.config;
        config.validate()?;

        let slot = self.slot.unwrap_or_default();
        if let Some(backend) = self.backend {
            slot.install(backend);
        } else if self.install_http_backend && !slot.is_ready() && config.endpoint_url.is_some() {
            slot.install(Box::new(HttpBackend::new(&config)?));
        }

        let kv_store: Arc<dyn KeyValueStore> = match (self.kv_store, &config.storage.dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Arc::new(FileStore::new(dir.clone())),
            (None, None) => Arc::new(MemoryStore::new()),
        };
        debug!(backend = kv_store.name(), key = config.storage.key.as_str(), "opening transcript");
        let store = Arc::new(TranscriptStore::open(kv_store, config.storage.key.clone()).await);

        let reachability = self
            .reachability
            .unwrap_or_else(|| Arc::new(HttpReachability::new()));
        let prober = ConnectivityProber::new(
            self.online,
            reachability,
            config.probe_url.clone(),
            Duration::from_millis(config.probe_timeout_ms),
        );
        let gate = RemoteClientGate::new(
            slot.clone(),
            Duration::from_millis(config.ready_poll_interval_ms),
        );
        let dispatcher = Dispatcher::new(
            prober,
            gate,
            Duration::from_millis(config.ready_timeout_ms),
            Duration::from_millis(config.dispatch_timeout_ms),
        )
        .fail_on_degraded(config.fail_on_degraded);

        Ok(ChatClient::from_inner(ClientInner {
            store,
            slot,
            dispatcher,
            decoder: StreamDecoder::new(Duration::from_millis(config.stream_idle_timeout_ms)),
            retry: RetryController::from_settings(&config.retry),
            classifier: ErrorClassifier::new(&config.retryable_patterns),
        }))
    }
}

impl Default for ChatClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
