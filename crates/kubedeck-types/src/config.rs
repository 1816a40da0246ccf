use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::namespace::{NamespaceError, NamespaceSelector};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid preferred namespace: {0}")]
    Namespace(#[from] NamespaceError),
    #[error("invalid server scheme '{0}', expected http or https")]
    Scheme(String),
}

/// Process-wide configuration, loaded once at startup
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    pub server: ServerConfig,
    pub namespace: NamespaceConfig,
    pub cache: CacheConfig,
}

impl DeckConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DeckConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.server.scheme.as_str() {
            "http" | "https" => {}
            other => return Err(ConfigError::Scheme(other.to_string())),
        }
        self.namespace.preferred_selector()?;
        Ok(())
    }
}

/// Where the REST endpoint lives and how requests are sent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,

    /// Default per-request timeout, overridable per call
    pub timeout_ms: u64,

    /// Base path of the operator-lifecycle and health service
    pub ops_path: String,

    /// Headers sent with every request
    pub headers: BTreeMap<String, String>,
}

impl ServerConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "127.0.0.1".to_string(),
            // kubectl proxy default
            port: 8001,
            timeout_ms: 30_000,
            ops_path: "/ops".to_string(),
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    /// Namespace used when a call does not name one; `_all` is allowed
    pub preferred: Option<String>,
}

impl NamespaceConfig {
    pub fn preferred_selector(&self) -> Result<Option<NamespaceSelector>, NamespaceError> {
        self.preferred.as_deref().map(str::parse).transpose()
    }
}

/// Staleness settings per resource class
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long ordinary resource reads stay fresh
    pub stale_time_secs: u64,

    /// How long status reads (operators, cluster health) stay fresh
    pub status_stale_time_secs: u64,

    /// Fixed refetch period for status reads; 0 disables it
    pub status_refetch_interval_secs: u64,
}

impl CacheConfig {
    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }

    pub fn status_stale_time(&self) -> Duration {
        Duration::from_secs(self.status_stale_time_secs)
    }

    pub fn status_refetch_interval(&self) -> Option<Duration> {
        (self.status_refetch_interval_secs > 0)
            .then(|| Duration::from_secs(self.status_refetch_interval_secs))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time_secs: 30,
            status_stale_time_secs: 0,
            status_refetch_interval_secs: 20,
        }
    }
}
