//! Client configuration
//!
//! Loaded from TOML at startup, falls back to defaults if no config file
//! exists. `CONSENTSYNC_BASE_URL` overrides the server base URL.

use crate::protocol::GDPR_ENDPOINT;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const BASE_URL_ENV: &str = "CONSENTSYNC_BASE_URL";

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Where the consent endpoint lives.
    pub server: ServerConfig,
    /// Host observer forwarding.
    pub observer: ObserverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Scheme + authority of the consent server.
    pub base_url: String,
    /// Path of the consent resource.
    pub endpoint: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// User-Agent sent with every request.
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObserverConfig {
    /// Forward the authorization outcome to a host observer.
    pub enabled: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("endpoint must be an absolute path, got {0:?}")]
    InvalidEndpoint(String),

    #[error("timeout must be at least one second")]
    ZeroTimeout,
}

// ============================================================
// Defaults
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:8443".into(),
            endpoint: GDPR_ENDPOINT.into(),
            timeout_secs: 30,
            user_agent: concat!("consentsync/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// ============================================================
// Loading
// ============================================================

impl ClientConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} - using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} - using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Apply environment overrides on top of file values.
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.server.base_url = url.trim().to_string();
            }
        }
        self
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.server.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.server.base_url.clone(),
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.server.base_url.clone(),
                reason: "cannot be a base".into(),
            });
        }
        if !self.server.endpoint.starts_with('/') {
            return Err(ConfigError::InvalidEndpoint(self.server.endpoint.clone()));
        }
        if self.server.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
