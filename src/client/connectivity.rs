//! Connectivity prober: device online flag plus a bounded reachability check.

use crate::transport::TransportError;
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Device-level "am I online" capability.
pub trait OnlineFlag: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Default flag: always reports online.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnline;

impl OnlineFlag for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Settable flag for hosts that learn about connectivity changes.
#[derive(Debug)]
pub struct AtomicOnlineFlag {
    online: AtomicBool,
}

impl AtomicOnlineFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for AtomicOnlineFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl OnlineFlag for AtomicOnlineFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Minimal request against a known-reachable URL. Only completion matters, not the result.
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn check(&self, url: &str) -> Result<()>;
}

/// HEAD request; the body is never read and the status is ignored.
#[derive(Debug, Clone, Default)]
pub struct HttpReachability {
    client: reqwest::Client,
}

impl HttpReachability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Reachability for HttpReachability {
    async fn check(&self, url: &str) -> Result<()> {
        let resp = self
            .client
            .head(url)
            .send()
            .await
            .map_err(TransportError::Http)?;
        debug!(status = resp.status().as_u16(), "probe answered");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Ok,
    Degraded,
    Offline,
}

pub struct ConnectivityProber {
    online: Arc<dyn OnlineFlag>,
    reachability: Arc<dyn Reachability>,
    probe_url: Option<String>,
    timeout: Duration,
}

impl ConnectivityProber {
    pub fn new(
        online: Arc<dyn OnlineFlag>,
        reachability: Arc<dyn Reachability>,
        probe_url: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            online,
            reachability,
            probe_url,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `Offline` when the device flag says so, `Degraded` when the probe does not
    /// settle within the bound, `Ok` for any other outcome (errors and non-2xx included).
    pub async fn probe(&self) -> Connectivity {
        if !self.online.is_online() {
            return Connectivity::Offline;
        }
        let Some(url) = self.probe_url.as_deref() else {
            return Connectivity::Ok;
        };
        match tokio::time::timeout(self.timeout, self.reachability.check(url)).await {
            Err(_) => Connectivity::Degraded,
            Ok(Err(e)) => {
                debug!(error = %e, "probe failed, treating network as usable");
                Connectivity::Ok
            }
            Ok(Ok(())) => Connectivity::Ok,
        }
    }
}
