use serde::{Deserialize, Serialize};
use serde_json::Value;

use kubedeck_transport::ApiError;
use kubedeck_types::StatusBody;

// ============================================================================
// Parameter object
// ============================================================================

/// Path, query and body of one typed operation
///
/// Each facade method fixes `P`, `Q` and `B`, so a call that leaves out a
/// required part or adds one the operation does not take does not compile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params<P, Q = (), B = ()> {
    pub path: P,
    pub query: Q,
    pub body: B,
}

impl<P, Q: Default> Params<P, Q, ()> {
    /// Parameters with a path and the default query
    pub fn at(path: P) -> Self {
        Self {
            path,
            query: Q::default(),
            body: (),
        }
    }
}

impl<Q: Default> Params<NoPath, Q, ()> {
    pub fn new() -> Self {
        Self::at(NoPath)
    }
}

impl<Q: Default> Params<NamespacePath, Q, ()> {
    pub fn namespaced(namespace: impl Into<String>) -> Self {
        Self::at(NamespacePath {
            namespace: namespace.into(),
        })
    }
}

impl<Q: Default> Params<NamedPath, Q, ()> {
    pub fn named(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::at(NamedPath {
            namespace: namespace.into(),
            name: name.into(),
        })
    }
}

impl<Q: Default> Params<ClusterNamedPath, Q, ()> {
    pub fn cluster_named(name: impl Into<String>) -> Self {
        Self::at(ClusterNamedPath { name: name.into() })
    }
}

impl<P, Q, B> Params<P, Q, B> {
    pub fn with_query(mut self, query: Q) -> Self {
        self.query = query;
        self
    }

    pub fn with_body<B2>(self, body: B2) -> Params<P, Q, B2> {
        Params {
            path: self.path,
            query: self.query,
            body,
        }
    }
}

// ============================================================================
// Paths
// ============================================================================

/// Collection without a namespace: cluster kinds or all namespaces
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoPath;

/// Collection inside one namespace
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespacePath {
    pub namespace: String,
}

/// Object inside one namespace
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamedPath {
    pub namespace: String,
    pub name: String,
}

/// Cluster-scoped object
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterNamedPath {
    pub name: String,
}

/// Untyped path variables, as the generic executor sees them
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourcePath {
    pub namespace: Option<String>,
    pub name: Option<String>,
}

impl From<NoPath> for ResourcePath {
    fn from(_: NoPath) -> Self {
        ResourcePath::default()
    }
}

impl From<NamespacePath> for ResourcePath {
    fn from(path: NamespacePath) -> Self {
        ResourcePath {
            namespace: Some(path.namespace),
            name: None,
        }
    }
}

impl From<NamedPath> for ResourcePath {
    fn from(path: NamedPath) -> Self {
        ResourcePath {
            namespace: Some(path.namespace),
            name: Some(path.name),
        }
    }
}

impl From<ClusterNamedPath> for ResourcePath {
    fn from(path: ClusterNamedPath) -> Self {
        ResourcePath {
            namespace: None,
            name: Some(path.name),
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Query of list, watch and delete-collection calls
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_selector: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    #[serde(rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continue_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretty: Option<String>,
}

impl ListQuery {
    pub fn labels(selector: impl Into<String>) -> Self {
        Self {
            label_selector: Some(selector.into()),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretty: Option<String>,
}

/// Query of create, replace and patch calls
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteQuery {
    /// `All` to validate without persisting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_manager: Option<String>,

    /// `Ignore`, `Warn` or `Strict`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_validation: Option<String>,

    /// Only meaningful for apply patches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretty: Option<String>,
}

impl WriteQuery {
    pub fn dry_run() -> Self {
        Self {
            dry_run: Some("All".to_string()),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period_seconds: Option<u32>,

    /// `Orphan`, `Background` or `Foreground`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_policy: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretty: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail_lines: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub since_seconds: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_bytes: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<bool>,
}

// ============================================================================
// Bodies
// ============================================================================

/// A patch document and its flavour
#[derive(Clone, Debug, PartialEq)]
pub enum Patch {
    /// JSON merge patch (RFC 7386)
    Merge(Value),
    /// Kubernetes strategic merge patch
    StrategicMerge(Value),
    /// JSON patch (RFC 6902)
    Json(Value),
    /// Server-side apply; needs `field_manager`
    Apply(Value),
}

impl Patch {
    pub fn content_type(&self) -> &'static str {
        match self {
            Patch::Merge(_) => "application/merge-patch+json",
            Patch::StrategicMerge(_) => "application/strategic-merge-patch+json",
            Patch::Json(_) => "application/json-patch+json",
            Patch::Apply(_) => "application/apply-patch+yaml",
        }
    }

    pub fn document(&self) -> &Value {
        match self {
            Patch::Merge(doc) | Patch::StrategicMerge(doc) | Patch::Json(doc) | Patch::Apply(doc) => {
                doc
            }
        }
    }
}

/// Untyped body, as the generic executor sees it
#[derive(Clone, Debug, PartialEq)]
pub enum OperationBody {
    Resource(Value),
    Patch(Patch),
}

/// Request descriptor handed to [`crate::KubernetesClient::execute`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperationRequest {
    pub path: ResourcePath,

    /// Serialized query; `Null` for none
    pub query: Value,

    pub body: Option<OperationBody>,
}

impl OperationRequest {
    pub fn new(path: impl Into<ResourcePath>) -> Self {
        Self {
            path: path.into(),
            query: Value::Null,
            body: None,
        }
    }

    pub fn with_query<Q: Serialize>(mut self, query: &Q) -> Result<Self, ApiError> {
        self.query = serde_json::to_value(query).map_err(|e| ApiError::Encode(e.to_string()))?;
        Ok(self)
    }

    pub fn with_resource<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        self.body = Some(OperationBody::Resource(value));
        Ok(self)
    }

    pub fn with_patch(mut self, patch: Patch) -> Self {
        self.body = Some(OperationBody::Patch(patch));
        self
    }
}

impl<P, Q> TryFrom<Params<P, Q>> for OperationRequest
where
    P: Into<ResourcePath>,
    Q: Serialize,
{
    type Error = ApiError;

    fn try_from(params: Params<P, Q>) -> Result<Self, Self::Error> {
        OperationRequest::new(params.path).with_query(&params.query)
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Result of deleting one object
///
/// The server answers with the object while finalizers run, or with a
/// `Status` when it was removed right away.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DeleteResponse<K> {
    Resource(K),
    Status(StatusBody),
}

impl<K> DeleteResponse<K> {
    pub fn resource(&self) -> Option<&K> {
        match self {
            DeleteResponse::Resource(obj) => Some(obj),
            DeleteResponse::Status(_) => None,
        }
    }

    pub fn into_resource(self) -> Option<K> {
        match self {
            DeleteResponse::Resource(obj) => Some(obj),
            DeleteResponse::Status(_) => None,
        }
    }
}
