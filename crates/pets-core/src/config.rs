//! TOML configuration shared by the cat and owner services.
//!
//! ```toml
//! [service]
//! name = "cat-service"
//! log_level = "debug"
//!
//! [broker]
//! address = "127.0.0.1:5679"
//!
//! [rpc]
//! timeout_ms = 5000
//! reply_namespace = "cat-service"
//!
//! [listener]
//! concurrency = 8
//! ```
//!
//! Every field has a `#[serde(default = ...)]`, so a partial file, an empty
//! file, or no file at all yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rpc::RpcConfig;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PETS_CONFIG";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub broker: BrokerSection,
    #[serde(default)]
    pub rpc: RpcSection,
    #[serde(default)]
    pub listener: ListenerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceSection {
    /// Used in logs and as the default reply-queue namespace.
    #[serde(default = "default_service_name")]
    pub name: String,
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrokerSection {
    /// `host:port` of the broker daemon.
    #[serde(default = "default_broker_address")]
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcSection {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Falls back to `service.name` when absent.
    #[serde(default)]
    pub reply_namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListenerSection {
    /// Requests processed concurrently per request queue.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_service_name() -> String {
    "pets-service".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_broker_address() -> String {
    "127.0.0.1:5679".to_string()
}
fn default_timeout_ms() -> u64 {
    5000
}
fn default_concurrency() -> usize {
    8
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            address: default_broker_address(),
        }
    }
}

impl Default for RpcSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            reply_namespace: None,
        }
    }
}

impl Default for ListenerSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service: ServiceSection::default(),
            broker: BrokerSection::default(),
            rpc: RpcSection::default(),
            listener: ListenerSection::default(),
        }
    }
}

impl ServiceConfig {
    /// Default configuration for the service called `name`.
    pub fn for_service(name: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.service.name = name.into();
        config
    }

    /// RPC caller settings derived from this configuration.
    pub fn rpc_config(&self) -> RpcConfig {
        let namespace = self
            .rpc
            .reply_namespace
            .clone()
            .unwrap_or_else(|| self.service.name.clone());
        RpcConfig::default()
            .with_timeout(Duration::from_millis(self.rpc.timeout_ms))
            .with_namespace(namespace)
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Picks the config file path: `PETS_CONFIG` wins, then the first
/// command-line argument.
pub fn config_path_from(env_value: Option<String>, mut args: impl Iterator<Item = String>) -> Option<PathBuf> {
    env_value
        .filter(|v| !v.trim().is_empty())
        .or_else(|| args.next())
        .map(PathBuf::from)
}

/// Loads the configuration at `path`, or defaults named `service_name` when
/// no path is given or the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>, service_name: &str) -> Result<ServiceConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(ServiceConfig::for_service(service_name));
    };

    match std::fs::read_to_string(path) {
        Ok(content) => {
            let mut cfg: ServiceConfig = toml::from_str(&content)?;
            if cfg.service.name == default_service_name() {
                cfg.service.name = service_name.to_string();
            }
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(ServiceConfig::for_service(service_name))
        }
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
