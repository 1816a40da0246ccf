//! Shared types for kubedeck
//!
//! This crate contains the data structures used across the transport, facade
//! and query crates: list and watch envelopes, the namespace selector,
//! operator-lifecycle types, and the process-wide configuration.

mod config;
mod namespace;

pub use config::{CacheConfig, ConfigError, DeckConfig, NamespaceConfig, ServerConfig};
pub use namespace::{ALL_NAMESPACES, NamespaceError, NamespaceSelector};

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ListMeta;
use serde::{Deserialize, Serialize};

// ============================================================================
// Envelopes
// ============================================================================

/// List envelope returned by collection reads
///
/// Items keep the order the server returned them in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectList<K> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Continuation token and resource version of the list
    #[serde(default)]
    pub metadata: ListMeta,

    #[serde(default = "Vec::new")]
    pub items: Vec<K>,
}

impl<K> ObjectList<K> {
    pub fn new(items: Vec<K>) -> Self {
        Self {
            api_version: None,
            kind: None,
            metadata: ListMeta::default(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Token to pass as `continue` to fetch the next page, if any
    pub fn continue_token(&self) -> Option<&str> {
        self.metadata
            .continue_
            .as_deref()
            .filter(|token| !token.is_empty())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, K> {
        self.items.iter()
    }
}

impl<K> Default for ObjectList<K> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// A single watch event `{type, object}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "object", rename_all = "UPPERCASE")]
pub enum WatchEvent<K> {
    Added(K),
    Modified(K),
    Deleted(K),
    /// Bookmarks only carry a partial object with the resource version
    Bookmark(serde_json::Value),
    Error(StatusBody),
}

impl<K> WatchEvent<K> {
    /// The object carried by the event, if it is a full object
    pub fn object(&self) -> Option<&K> {
        match self {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) | WatchEvent::Deleted(obj) => {
                Some(obj)
            }
            WatchEvent::Bookmark(_) | WatchEvent::Error(_) => None,
        }
    }
}

/// Structured `Status` object returned by the control plane
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// `Success` or `Failure`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl StatusBody {
    pub fn success() -> Self {
        Self {
            kind: Some("Status".to_string()),
            api_version: Some("v1".to_string()),
            status: Some("Success".to_string()),
            ..Default::default()
        }
    }

    pub fn failure(code: u16, reason: &str, message: impl Into<String>) -> Self {
        Self {
            kind: Some("Status".to_string()),
            api_version: Some("v1".to_string()),
            status: Some("Failure".to_string()),
            message: Some(message.into()),
            reason: Some(reason.to_string()),
            code: Some(code),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("Success")
    }
}

// ============================================================================
// Operator lifecycle
// ============================================================================

/// An operator managed by the operator-lifecycle service
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operator {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub phase: OperatorPhase,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Operator {
    pub fn new(name: impl Into<String>, phase: OperatorPhase) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            version: None,
            phase,
            message: None,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.phase == OperatorPhase::Installed
    }
}

/// Install state of an operator
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorPhase {
    NotInstalled,
    Installing,
    Installed,
    Uninstalling,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl OperatorPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorPhase::NotInstalled => "NotInstalled",
            OperatorPhase::Installing => "Installing",
            OperatorPhase::Installed => "Installed",
            OperatorPhase::Uninstalling => "Uninstalling",
            OperatorPhase::Failed => "Failed",
            OperatorPhase::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for OperatorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Cluster health
// ============================================================================

/// Aggregated health report of the cluster
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterHealth {
    #[serde(default)]
    pub status: HealthStatus,

    #[serde(default)]
    pub nodes_ready: u32,

    #[serde(default)]
    pub nodes_total: u32,

    #[serde(default)]
    pub components: Vec<ComponentHealth>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
}

impl ClusterHealth {
    /// Format node readiness as "ready/total"
    pub fn node_summary(&self) -> String {
        format!("{}/{}", self.nodes_ready, self.nodes_total)
    }

    pub fn unhealthy_components(&self) -> impl Iterator<Item = &ComponentHealth> {
        self.components.iter().filter(|c| !c.healthy)
    }
}

/// Overall health verdict
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Degraded => "Degraded",
            HealthStatus::Unhealthy => "Unhealthy",
            HealthStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Health of a single control-plane component
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub name: String,
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
