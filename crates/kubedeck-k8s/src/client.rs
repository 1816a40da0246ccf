use std::fmt;
use std::marker::PhantomData;

use k8s_openapi::Resource;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Event, LimitRange, Namespace, Node, PersistentVolume,
    PersistentVolumeClaim, Pod, ResourceQuota, Secret, Service, ServiceAccount,
};
use k8s_openapi::api::networking::v1::{Ingress, NetworkPolicy};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::api::storage::v1::StorageClass;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use kubedeck_transport::{ApiClient, ApiError, RequestOptions};
use kubedeck_types::{ObjectList, StatusBody, WatchEvent};

use crate::operation::{is_path_segment, operation};
use crate::params::{
    ClusterNamedPath, DeleteQuery, DeleteResponse, ListQuery, LogQuery, NamedPath, NamespacePath,
    NoPath, OperationBody, OperationRequest, Params, Patch, ReadQuery, WriteQuery,
};
use crate::{
    ClusterResourceScope, NamespaceResourceScope, OperationScope, OperationSpec, ResourceKind,
    ResponseKind, Scope, Verb,
};

// ============================================================================
// Generic executor
// ============================================================================

/// Facade over the control-plane REST API
///
/// Cheap to clone.
#[derive(Clone, Debug)]
pub struct KubernetesClient {
    api: ApiClient,
}

/// A validated operation, ready to send
struct Prepared {
    spec: &'static OperationSpec,
    endpoint: String,
    query: Value,
    body: Option<Value>,
    options: RequestOptions,
}

impl KubernetesClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Typed access to any k8s-openapi resource
    pub fn resource<K>(&self) -> ResourceApi<K>
    where
        K: Resource,
        K::Scope: Scope,
    {
        ResourceApi {
            client: self.clone(),
            kind: ResourceKind::of::<K>(),
            _marker: PhantomData,
        }
    }

    /// Run one operation and decode its JSON response
    ///
    /// This is the single path every typed method goes through. The request
    /// is checked against the operation table before anything is sent.
    pub async fn execute<R>(
        &self,
        kind: &ResourceKind,
        verb: Verb,
        scope: OperationScope,
        request: OperationRequest,
    ) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
    {
        let prepared = prepare(kind, verb, scope, request)?;
        if prepared.spec.response == ResponseKind::Text {
            return Err(ApiError::InvalidRequest(format!(
                "{} returns text, use execute_text",
                verb
            )));
        }

        debug!(kind = %kind, %verb, %scope, endpoint = %prepared.endpoint, "executing operation");
        self.api
            .request(
                prepared.spec.method(),
                &prepared.endpoint,
                &prepared.query,
                prepared.body.as_ref(),
                &prepared.options,
            )
            .await
    }

    /// Run an operation whose response is plain text, e.g. container logs
    pub async fn execute_text(
        &self,
        kind: &ResourceKind,
        verb: Verb,
        scope: OperationScope,
        request: OperationRequest,
    ) -> Result<String, ApiError> {
        let prepared = prepare(kind, verb, scope, request)?;
        if prepared.spec.response != ResponseKind::Text {
            return Err(ApiError::InvalidRequest(format!(
                "{} returns JSON, use execute",
                verb
            )));
        }

        debug!(kind = %kind, %verb, %scope, endpoint = %prepared.endpoint, "executing operation");
        self.api
            .get_text(&prepared.endpoint, &prepared.query, &prepared.options)
            .await
    }
}

fn invalid(kind: &ResourceKind, verb: Verb, scope: OperationScope, reason: &str) -> ApiError {
    ApiError::InvalidRequest(format!("{} {} ({}): {}", verb, kind, scope, reason))
}

/// Check a request against its table row and render the endpoint
fn prepare(
    kind: &ResourceKind,
    verb: Verb,
    scope: OperationScope,
    request: OperationRequest,
) -> Result<Prepared, ApiError> {
    let spec = operation(verb, scope)
        .ok_or_else(|| invalid(kind, verb, scope, "no such operation"))?;

    match (scope, kind.namespaced) {
        (OperationScope::Cluster, true) => {
            return Err(invalid(kind, verb, scope, "kind is namespaced"));
        }
        (OperationScope::Namespaced | OperationScope::AllNamespaces, false) => {
            return Err(invalid(kind, verb, scope, "kind is cluster-scoped"));
        }
        _ => {}
    }

    if verb == Verb::ReadLog && kind.kind != Pod::KIND {
        return Err(invalid(kind, verb, scope, "only pods have logs"));
    }

    let OperationRequest { path, query, body } = request;

    let namespace = match (scope, path.namespace) {
        (OperationScope::Namespaced, Some(ns)) if is_path_segment(&ns) => Some(ns),
        (OperationScope::Namespaced, Some(ns)) if !ns.is_empty() => {
            return Err(invalid(kind, verb, scope, &format!("invalid namespace '{}'", ns)));
        }
        (OperationScope::Namespaced, _) => {
            return Err(invalid(kind, verb, scope, "namespace is required"));
        }
        (_, Some(_)) => {
            return Err(invalid(kind, verb, scope, "namespace is not allowed"));
        }
        (_, None) => None,
    };

    let endpoint = match (spec.named, path.name) {
        (true, Some(name)) if is_path_segment(&name) => {
            kind.item_path(namespace.as_deref(), &name, spec.subresource)
        }
        (true, Some(name)) if !name.is_empty() => {
            return Err(invalid(kind, verb, scope, &format!("invalid name '{}'", name)));
        }
        (true, _) => return Err(invalid(kind, verb, scope, "name is required")),
        (false, Some(_)) => return Err(invalid(kind, verb, scope, "name is not allowed")),
        (false, None) => kind.collection_path(namespace.as_deref()),
    };

    let mut options = RequestOptions::new();
    let body = match (spec.body, verb, body) {
        (false, _, None) => None,
        (false, _, Some(_)) => return Err(invalid(kind, verb, scope, "body is not allowed")),
        (true, _, None) => return Err(invalid(kind, verb, scope, "body is required")),
        (true, Verb::Patch, Some(OperationBody::Patch(patch))) => {
            options = options.with_header("Content-Type", patch.content_type());
            Some(patch.document().clone())
        }
        (true, Verb::Patch, Some(OperationBody::Resource(_))) => {
            return Err(invalid(kind, verb, scope, "expected a patch body"));
        }
        (true, _, Some(OperationBody::Patch(_))) => {
            return Err(invalid(kind, verb, scope, "expected a resource body"));
        }
        (true, _, Some(OperationBody::Resource(resource))) => Some(resource),
    };

    let query = if spec.watch {
        let mut query = match query {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            _ => return Err(invalid(kind, verb, scope, "query must be an object")),
        };
        query.insert("watch".to_string(), Value::Bool(true));
        Value::Object(query)
    } else {
        query
    };

    Ok(Prepared {
        spec,
        endpoint,
        query,
        body,
        options,
    })
}

// ============================================================================
// Typed wrappers
// ============================================================================

/// Typed operations on one resource kind
///
/// Namespaced methods only exist for namespaced kinds and cluster methods
/// only for cluster kinds.
pub struct ResourceApi<K> {
    client: KubernetesClient,
    kind: ResourceKind,
    _marker: PhantomData<fn() -> K>,
}

impl<K> Clone for ResourceApi<K> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            kind: self.kind,
            _marker: PhantomData,
        }
    }
}

impl<K> fmt::Debug for ResourceApi<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceApi").field("kind", &self.kind).finish()
    }
}

impl<K> ResourceApi<K> {
    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    async fn run<R, P, Q>(&self, verb: Verb, scope: OperationScope, params: Params<P, Q>) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
        P: Into<crate::ResourcePath>,
        Q: Serialize,
    {
        let request = OperationRequest::try_from(params)?;
        self.client.execute(&self.kind, verb, scope, request).await
    }

    async fn run_with_resource<P, Q>(
        &self,
        verb: Verb,
        scope: OperationScope,
        params: Params<P, Q, K>,
    ) -> Result<K, ApiError>
    where
        K: Serialize + DeserializeOwned,
        P: Into<crate::ResourcePath>,
        Q: Serialize,
    {
        let request = OperationRequest::new(params.path)
            .with_query(&params.query)?
            .with_resource(&params.body)?;
        self.client.execute(&self.kind, verb, scope, request).await
    }

    async fn run_with_patch<P, Q>(
        &self,
        scope: OperationScope,
        params: Params<P, Q, Patch>,
    ) -> Result<K, ApiError>
    where
        K: DeserializeOwned,
        P: Into<crate::ResourcePath>,
        Q: Serialize,
    {
        let request = OperationRequest::new(params.path)
            .with_query(&params.query)?
            .with_patch(params.body);
        self.client
            .execute(&self.kind, Verb::Patch, scope, request)
            .await
    }
}

impl<K> ResourceApi<K>
where
    K: Resource<Scope = NamespaceResourceScope> + Serialize + DeserializeOwned,
{
    pub async fn list_namespaced(&self, params: Params<NamespacePath, ListQuery>) -> Result<ObjectList<K>, ApiError> {
        self.run(Verb::List, OperationScope::Namespaced, params).await
    }

    pub async fn list_for_all_namespaces(&self, params: Params<NoPath, ListQuery>) -> Result<ObjectList<K>, ApiError> {
        self.run(Verb::List, OperationScope::AllNamespaces, params)
            .await
    }

    pub async fn read_namespaced(&self, params: Params<NamedPath, ReadQuery>) -> Result<K, ApiError> {
        self.run(Verb::Read, OperationScope::Namespaced, params).await
    }

    pub async fn read_namespaced_status(&self, params: Params<NamedPath, ReadQuery>) -> Result<K, ApiError> {
        self.run(Verb::ReadStatus, OperationScope::Namespaced, params)
            .await
    }

    pub async fn create_namespaced(&self, params: Params<NamespacePath, WriteQuery, K>) -> Result<K, ApiError> {
        self.run_with_resource(Verb::Create, OperationScope::Namespaced, params)
            .await
    }

    pub async fn replace_namespaced(&self, params: Params<NamedPath, WriteQuery, K>) -> Result<K, ApiError> {
        self.run_with_resource(Verb::Replace, OperationScope::Namespaced, params)
            .await
    }

    pub async fn patch_namespaced(&self, params: Params<NamedPath, WriteQuery, Patch>) -> Result<K, ApiError> {
        self.run_with_patch(OperationScope::Namespaced, params).await
    }

    pub async fn delete_namespaced(&self, params: Params<NamedPath, DeleteQuery>) -> Result<DeleteResponse<K>, ApiError> {
        self.run(Verb::Delete, OperationScope::Namespaced, params).await
    }

    pub async fn delete_collection_namespaced(&self, params: Params<NamespacePath, ListQuery>) -> Result<StatusBody, ApiError> {
        self.run(Verb::DeleteCollection, OperationScope::Namespaced, params)
            .await
    }

    pub async fn watch_namespaced(&self, params: Params<NamespacePath, ListQuery>) -> Result<WatchEvent<K>, ApiError> {
        self.run(Verb::Watch, OperationScope::Namespaced, params).await
    }

    pub async fn watch_for_all_namespaces(&self, params: Params<NoPath, ListQuery>) -> Result<WatchEvent<K>, ApiError> {
        self.run(Verb::Watch, OperationScope::AllNamespaces, params)
            .await
    }
}

impl<K> ResourceApi<K>
where
    K: Resource<Scope = ClusterResourceScope> + Serialize + DeserializeOwned,
{
    pub async fn list(&self, params: Params<NoPath, ListQuery>) -> Result<ObjectList<K>, ApiError> {
        self.run(Verb::List, OperationScope::Cluster, params).await
    }

    pub async fn read(&self, params: Params<ClusterNamedPath, ReadQuery>) -> Result<K, ApiError> {
        self.run(Verb::Read, OperationScope::Cluster, params).await
    }

    pub async fn read_status(&self, params: Params<ClusterNamedPath, ReadQuery>) -> Result<K, ApiError> {
        self.run(Verb::ReadStatus, OperationScope::Cluster, params)
            .await
    }

    pub async fn create(&self, params: Params<NoPath, WriteQuery, K>) -> Result<K, ApiError> {
        self.run_with_resource(Verb::Create, OperationScope::Cluster, params)
            .await
    }

    pub async fn replace(&self, params: Params<ClusterNamedPath, WriteQuery, K>) -> Result<K, ApiError> {
        self.run_with_resource(Verb::Replace, OperationScope::Cluster, params)
            .await
    }

    pub async fn patch(&self, params: Params<ClusterNamedPath, WriteQuery, Patch>) -> Result<K, ApiError> {
        self.run_with_patch(OperationScope::Cluster, params).await
    }

    pub async fn delete(&self, params: Params<ClusterNamedPath, DeleteQuery>) -> Result<DeleteResponse<K>, ApiError> {
        self.run(Verb::Delete, OperationScope::Cluster, params).await
    }

    pub async fn delete_collection(&self, params: Params<NoPath, ListQuery>) -> Result<StatusBody, ApiError> {
        self.run(Verb::DeleteCollection, OperationScope::Cluster, params)
            .await
    }

    pub async fn watch(&self, params: Params<NoPath, ListQuery>) -> Result<WatchEvent<K>, ApiError> {
        self.run(Verb::Watch, OperationScope::Cluster, params).await
    }
}

impl ResourceApi<Pod> {
    /// Container log of a pod as plain text
    pub async fn read_namespaced_log(&self, params: Params<NamedPath, LogQuery>) -> Result<String, ApiError> {
        let request = OperationRequest::try_from(params)?;
        self.client
            .execute_text(&self.kind, Verb::ReadLog, OperationScope::Namespaced, request)
            .await
    }
}

// ============================================================================
// Known kinds
// ============================================================================

/// A kind reachable by name from the command line and dynamic hooks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KnownKind {
    pub kind: ResourceKind,
    pub short_names: &'static [&'static str],
}

impl KnownKind {
    /// Match a plural, singular kind or short name, case-insensitively
    pub fn matches(&self, name: &str) -> bool {
        self.kind.plural.eq_ignore_ascii_case(name)
            || self.kind.kind.eq_ignore_ascii_case(name)
            || self.short_names.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    /// Look a kind up in [`KNOWN_KINDS`]
    pub fn find(name: &str) -> Option<&'static KnownKind> {
        KNOWN_KINDS.iter().find(|known| known.matches(name))
    }
}

/// Generates one accessor per kind on `KubernetesClient` and the
/// `KNOWN_KINDS` table from the same list
macro_rules! known_kinds {
    ($( $accessor:ident => $ty:ty $([$($short:literal),*])? ),* $(,)?) => {
        impl KubernetesClient {
            $(
                #[doc = concat!("Typed access to `", stringify!($ty), "`")]
                pub fn $accessor(&self) -> ResourceApi<$ty> {
                    self.resource::<$ty>()
                }
            )*
        }

        /// Every kind with a generated accessor
        pub static KNOWN_KINDS: &[KnownKind] = &[
            $(
                KnownKind {
                    kind: ResourceKind::of::<$ty>(),
                    short_names: &[$($($short),*)?],
                },
            )*
        ];
    };
}

known_kinds! {
    // namespaced
    config_maps => ConfigMap ["cm"],
    secrets => Secret,
    pods => Pod ["po"],
    services => Service ["svc"],
    service_accounts => ServiceAccount ["sa"],
    endpoints => Endpoints ["ep"],
    events => Event ["ev"],
    limit_ranges => LimitRange ["limits"],
    resource_quotas => ResourceQuota ["quota"],
    persistent_volume_claims => PersistentVolumeClaim ["pvc"],
    deployments => Deployment ["deploy"],
    daemon_sets => DaemonSet ["ds"],
    stateful_sets => StatefulSet ["sts"],
    replica_sets => ReplicaSet ["rs"],
    jobs => Job,
    cron_jobs => CronJob ["cj"],
    ingresses => Ingress ["ing"],
    network_policies => NetworkPolicy ["netpol"],
    roles => Role,
    role_bindings => RoleBinding,
    // cluster
    namespaces => Namespace ["ns"],
    nodes => Node ["no"],
    persistent_volumes => PersistentVolume ["pv"],
    storage_classes => StorageClass ["sc"],
    cluster_roles => ClusterRole,
    cluster_role_bindings => ClusterRoleBinding,
}
