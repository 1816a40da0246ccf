use serde::Serialize;
use tracing::info;

use kubedeck_transport::{ApiClient, ApiError, Method, RequestOptions};
use kubedeck_types::{ClusterHealth, ObjectList, Operator};

use crate::operation::is_path_segment;

/// Query of install and uninstall calls
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallQuery {
    /// Block until the operator reaches its target phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait: Option<bool>,

    /// How long the service waits when `wait` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Client for the operator-lifecycle and health service
#[derive(Clone, Debug)]
pub struct OperatorClient {
    api: ApiClient,
    base_path: String,
}

impl OperatorClient {
    /// Create a client for the service mounted at `base_path`, e.g. `/ops`
    pub fn new(api: ApiClient, base_path: impl Into<String>) -> Self {
        let base_path = base_path.into().trim_end_matches('/').to_string();
        Self { api, base_path }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub async fn list(&self) -> Result<ObjectList<Operator>, ApiError> {
        self.api
            .get(
                &format!("{}/operators", self.base_path),
                &(),
                &RequestOptions::new(),
            )
            .await
    }

    pub async fn install(&self, name: &str, query: &InstallQuery) -> Result<Operator, ApiError> {
        info!(operator = name, wait = ?query.wait, "installing operator");
        self.lifecycle(name, "install", query).await
    }

    pub async fn uninstall(&self, name: &str, query: &InstallQuery) -> Result<Operator, ApiError> {
        info!(operator = name, wait = ?query.wait, "uninstalling operator");
        self.lifecycle(name, "uninstall", query).await
    }

    pub async fn cluster_health(&self) -> Result<ClusterHealth, ApiError> {
        self.api
            .get(
                &format!("{}/health", self.base_path),
                &(),
                &RequestOptions::new(),
            )
            .await
    }

    async fn lifecycle(&self, name: &str, action: &str, query: &InstallQuery) -> Result<Operator, ApiError> {
        if !is_path_segment(name) {
            return Err(ApiError::InvalidRequest(format!(
                "invalid operator name '{}'",
                name
            )));
        }

        // A long wait on the service side must not be cut short by the client
        let mut options = RequestOptions::new();
        if let (Some(true), Some(ms)) = (query.wait, query.timeout_ms) {
            let wait = std::time::Duration::from_millis(ms);
            if wait >= self.api.default_timeout() {
                options = options.with_timeout(wait + std::time::Duration::from_secs(5));
            }
        }

        self.api
            .request(
                Method::POST,
                &format!("{}/operators/{}/{}", self.base_path, name, action),
                query,
                None::<&()>,
                &options,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubedeck_transport::test_utils::FakeApiServer;
    use kubedeck_transport::RawResponse;
    use kubedeck_types::{HealthStatus, OperatorPhase};
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_list_operators() {
        let server = FakeApiServer::new();
        server.route(Method::GET, "/ops/operators", |_| {
            RawResponse::json(
                200,
                &json!({"items": [
                    {"name": "cert-manager", "phase": "NotInstalled"},
                    {"name": "prometheus", "phase": "Installed", "version": "2.53.0"}
                ]}),
            )
        });

        let ops = OperatorClient::new(server.client(), "/ops/");
        let list = ops.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.items[1].is_installed());
        assert_eq!(list.items[0].phase, OperatorPhase::NotInstalled);
    }

    #[tokio::test]
    async fn test_install_sends_wait_and_timeout() {
        let server = FakeApiServer::new();
        server.route(Method::POST, "/ops/operators/cert-manager/install", |req| {
            assert_eq!(req.query_value("wait"), Some("true"));
            assert_eq!(req.query_value("timeoutMs"), Some("60000"));
            RawResponse::json(200, &json!({"name": "cert-manager", "phase": "Installed"}))
        });

        let ops = OperatorClient::new(server.client(), "/ops");
        let op = ops
            .install(
                "cert-manager",
                &InstallQuery {
                    wait: Some(true),
                    timeout_ms: Some(60_000),
                },
            )
            .await
            .unwrap();
        assert!(op.is_installed());

        let request = server.requests().pop().unwrap();
        assert_eq!(request.timeout, Duration::from_secs(65));
    }

    #[tokio::test]
    async fn test_uninstall_error_message() {
        let server = FakeApiServer::new();
        server.route(Method::POST, "/ops/operators/istio/uninstall", |_| {
            RawResponse::json(409, &json!({"error": "operator istio is in use"}))
        });

        let ops = OperatorClient::new(server.client(), "/ops");
        let err = ops
            .uninstall("istio", &InstallQuery::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "operator istio is in use");

        let err = ops
            .install("a/b", &InstallQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));

        let err = ops
            .install("..", &InstallQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_cluster_health() {
        let server = FakeApiServer::new();
        server.route(Method::GET, "/ops/health", |_| {
            RawResponse::json(
                200,
                &json!({"status": "Healthy", "nodesReady": 3, "nodesTotal": 3}),
            )
        });

        let health = OperatorClient::new(server.client(), "/ops")
            .cluster_health()
            .await
            .unwrap();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.node_summary(), "3/3");
    }
}
