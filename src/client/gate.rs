//! Remote client gate: wait for the completion backend to be installed.

use crate::transport::CompletionBackend;
use crate::{Error, Result};
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub type SharedBackend = Arc<Box<dyn CompletionBackend>>;

/// Cell the backend handle is installed into, possibly late and from another task.
#[derive(Default)]
pub struct ClientSlot {
    inner: ArcSwapOption<Box<dyn CompletionBackend>>,
}

impl ClientSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(backend: Box<dyn CompletionBackend>) -> Self {
        let slot = Self::new();
        slot.install(backend);
        slot
    }

    pub fn install(&self, backend: Box<dyn CompletionBackend>) {
        debug!(backend = backend.name(), "completion backend installed");
        self.inner.store(Some(Arc::new(backend)));
    }

    pub fn uninstall(&self) {
        self.inner.store(None);
    }

    pub fn get(&self) -> Option<SharedBackend> {
        self.inner.load_full()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.load().is_some()
    }
}

pub struct RemoteClientGate {
    slot: Arc<ClientSlot>,
    poll_interval: Duration,
}

impl RemoteClientGate {
    pub fn new(slot: Arc<ClientSlot>, poll_interval: Duration) -> Self {
        Self {
            slot,
            poll_interval,
        }
    }

    pub fn slot(&self) -> &Arc<ClientSlot> {
        &self.slot
    }

    /// Poll the slot until a backend shows up or `timeout` elapses.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<SharedBackend> {
        let started = Instant::now();
        loop {
            if let Some(backend) = self.slot.get() {
                return Ok(backend);
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(Error::SdkUnavailable {
                    waited_ms: waited.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.poll_interval.min(timeout - waited)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RemoteReply;
    use crate::types::CompletionRequest;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl CompletionBackend for Echo {
        async fn complete(&self, request: &CompletionRequest) -> Result<RemoteReply> {
            Ok(RemoteReply::Body(serde_json::json!({
                "success": true,
                "response": request.message,
            })))
        }
        fn name(&self) -> &'static str {
            "echo"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_nothing_is_installed() {
        let gate = RemoteClientGate::new(Arc::new(ClientSlot::new()), Duration::from_millis(100));
        let started = Instant::now();
        match gate.wait_until_ready(Duration::from_millis(10_000)).await {
            Err(Error::SdkUnavailable { waited_ms }) => assert!(waited_ms >= 10_000),
            other => panic!("unexpected {:?}", other.map(|b| b.name())),
        }
        assert!(started.elapsed() >= Duration::from_millis(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn picks_up_a_late_install() {
        let slot = Arc::new(ClientSlot::new());
        let gate = RemoteClientGate::new(slot.clone(), Duration::from_millis(100));
        let installer = {
            let slot = slot.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(450)).await;
                slot.install(Box::new(Echo));
            })
        };
        let backend = gate
            .wait_until_ready(Duration::from_millis(10_000))
            .await
            .unwrap();
        assert_eq!(backend.name(), "echo");
        installer.await.unwrap();
        assert!(slot.is_ready());
    }
}
