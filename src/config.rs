//! Client configuration: YAML file first, environment variables on top.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_PROBE_URL: &str = "https://www.google.com/favicon.ico";
pub const DEFAULT_STORAGE_KEY: &str = "chat-messages";

/// Wording that marks an unstructured failure as transient.
pub const DEFAULT_RETRYABLE_PATTERNS: &[&str] = &[
    "network",
    "fetch",
    "connection",
    "timeout",
    "timed out",
    "500",
    "502",
    "503",
    "504",
    "not ready",
    "not available",
    "not loaded",
    "malformed",
    "invalid response",
    "parse",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Remote completion endpoint. Without it no HTTP backend is installed.
    pub endpoint_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub proxy_url: Option<String>,
    /// Reachability probe target; `None` skips the network probe.
    pub probe_url: Option<String>,
    pub probe_timeout_ms: u64,
    pub ready_timeout_ms: u64,
    pub ready_poll_interval_ms: u64,
    pub dispatch_timeout_ms: u64,
    pub stream_idle_timeout_ms: u64,
    /// When false, a degraded probe only logs a warning and dispatch proceeds.
    pub fail_on_degraded: bool,
    pub retry: RetrySettings,
    pub retryable_patterns: Vec<String>,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: Option<u64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory for the file store; `None` keeps the transcript in memory.
    pub dir: Option<PathBuf>,
    pub key: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            dir: None,
            key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            api_key: None,
            proxy_url: None,
            probe_url: Some(DEFAULT_PROBE_URL.to_string()),
            probe_timeout_ms: 3_000,
            ready_timeout_ms: 10_000,
            ready_poll_interval_ms: 100,
            dispatch_timeout_ms: 30_000,
            stream_idle_timeout_ms: 60_000,
            fail_on_degraded: true,
            retry: RetrySettings::default(),
            retryable_patterns: DEFAULT_RETRYABLE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            storage: StorageSettings::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let cfg: ClientConfig = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config file: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&raw)
    }

    /// YAML from `CHAT_CONFIG` when set (defaults otherwise), then `CHAT_*` overrides.
    pub fn from_env() -> Result<Self> {
        let mut cfg = match env_string("CHAT_CONFIG") {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_string("CHAT_ENDPOINT_URL") {
            self.endpoint_url = Some(v);
        }
        if let Some(v) = env_string("CHAT_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = env_string("CHAT_PROXY_URL") {
            self.proxy_url = Some(v);
        }
        if let Some(v) = env_string("CHAT_PROBE_URL") {
            // "none" disables the network probe entirely.
            self.probe_url = if v.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(v)
            };
        }
        if let Some(v) = env_u64("CHAT_PROBE_TIMEOUT_MS")? {
            self.probe_timeout_ms = v;
        }
        if let Some(v) = env_u64("CHAT_READY_TIMEOUT_MS")? {
            self.ready_timeout_ms = v;
        }
        if let Some(v) = env_u64("CHAT_DISPATCH_TIMEOUT_MS")? {
            self.dispatch_timeout_ms = v;
        }
        if let Some(v) = env_u64("CHAT_STREAM_IDLE_TIMEOUT_MS")? {
            self.stream_idle_timeout_ms = v;
        }
        if let Some(v) = env_u64("CHAT_MAX_RETRIES")? {
            self.retry.max_retries = u32::try_from(v).unwrap_or(u32::MAX);
        }
        if let Some(v) = env_u64("CHAT_RETRY_BASE_DELAY_MS")? {
            self.retry.base_delay_ms = v;
        }
        if let Some(v) = env_string("CHAT_STORAGE_DIR") {
            self.storage.dir = Some(PathBuf::from(v));
        }
        if let Some(v) = env_string("CHAT_STORAGE_KEY") {
            self.storage.key = v;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("endpoint_url", &self.endpoint_url),
            ("probe_url", &self.probe_url),
            ("proxy_url", &self.proxy_url),
        ] {
            if let Some(raw) = value {
                url::Url::parse(raw).map_err(|e| {
                    Error::configuration_with_context(
                        format!("invalid url: {}", e),
                        ErrorContext::new()
                            .with_field_path(field)
                            .with_details(raw.clone())
                            .with_source("config_loader"),
                    )
                })?;
            }
        }
        if self.ready_poll_interval_ms == 0 {
            return Err(Error::configuration_with_context(
                "poll interval must be positive",
                ErrorContext::new()
                    .with_field_path("ready_poll_interval_ms")
                    .with_source("config_loader"),
            ));
        }
        if self.storage.key.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "storage key must not be empty",
                ErrorContext::new()
                    .with_field_path("storage.key")
                    .with_source("config_loader"),
            ));
        }
        Ok(())
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match env_string(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<u64>().map(Some).map_err(|_| {
            Error::configuration_with_context(
                "expected a non-negative integer",
                ErrorContext::new()
                    .with_field_path(name)
                    .with_details(raw)
                    .with_source("env"),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_constants() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.probe_timeout_ms, 3_000);
        assert_eq!(cfg.ready_timeout_ms, 10_000);
        assert_eq!(cfg.ready_poll_interval_ms, 100);
        assert_eq!(cfg.dispatch_timeout_ms, 30_000);
        assert_eq!(cfg.stream_idle_timeout_ms, 60_000);
        assert_eq!(cfg.retry.max_retries, 3);
        assert_eq!(cfg.retry.base_delay_ms, 1000);
        assert!(cfg.retryable_patterns.iter().any(|p| p == "503"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn yaml_partial_override_keeps_defaults() {
        let cfg = ClientConfig::from_yaml_str(
            r#"
endpoint_url: "https://chat.example.com/api/send"
dispatch_timeout_ms: 5000
retry:
  max_retries: 1
storage:
  key: my-chat
"#,
        )
        .unwrap();
        assert_eq!(
            cfg.endpoint_url.as_deref(),
            Some("https://chat.example.com/api/send")
        );
        assert_eq!(cfg.dispatch_timeout_ms, 5000);
        assert_eq!(cfg.retry.max_retries, 1);
        assert_eq!(cfg.retry.base_delay_ms, 1000);
        assert_eq!(cfg.storage.key, "my-chat");
        assert_eq!(cfg.stream_idle_timeout_ms, 60_000);
    }

    #[test]
    fn invalid_url_is_rejected_with_field_path() {
        let err = ClientConfig::from_yaml_str("endpoint_url: \"not a url\"").unwrap_err();
        let ctx = err.context().cloned().unwrap();
        assert_eq!(ctx.field_path.as_deref(), Some("endpoint_url"));
    }

    #[test]
    fn api_key_is_never_serialized() {
        let cfg = ClientConfig {
            api_key: Some("secret".into()),
            ..ClientConfig::default()
        };
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        assert!(!yaml.contains("secret"));
    }
}
