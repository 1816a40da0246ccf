//! The per-resource, per-verb surface callers use
//!
//! Every read is a cached [`Query`] and every write a [`Mutation`]. The
//! transport never leaks through this module.

mod resources;

use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::{Metadata, Resource};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;

use kubedeck_k8s::{
    ClusterNamedPath, ClusterResourceScope, DeleteResponse, InstallQuery, KubernetesClient, LogQuery,
    NamedPath, NamespacePath, NamespaceResourceScope, OperationRequest, OperationScope, OperatorClient,
    Params, Patch, ResourceKind, ResourcePath, Verb,
};
use kubedeck_transport::{ApiClient, ApiError};
use kubedeck_types::{ClusterHealth, DeckConfig, NamespaceSelector, ObjectList, Operator};

use crate::{
    CachePolicies, ClusterContext, InvalidationPolicy, KeyPattern, KeyScope, Mutation, Query, QueryClient,
    QueryKey, QueryState, ResourceClass,
};

/// Kinds operator and health reads are cached under
const OPERATOR_KIND: &str = "Operator";
const HEALTH_KIND: &str = "ClusterHealth";

/// Cache name of a typed kind; see [`ResourceKind::qualified_kind`]
fn cache_kind<K: Resource>() -> String
where
    K::Scope: kubedeck_k8s::Scope,
{
    ResourceKind::of::<K>().qualified_kind()
}

// ============================================================================
// Inputs
// ============================================================================

/// A namespaced k8s-openapi resource usable through [`Hooks`]
pub trait NamespacedResource:
    Resource<Scope = NamespaceResourceScope>
    + Metadata<Ty = ObjectMeta>
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> NamespacedResource for K where
    K: Resource<Scope = NamespaceResourceScope>
        + Metadata<Ty = ObjectMeta>
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// A cluster-scoped k8s-openapi resource usable through [`Hooks`]
pub trait ClusterResource:
    Resource<Scope = ClusterResourceScope>
    + Metadata<Ty = ObjectMeta>
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> ClusterResource for K where
    K: Resource<Scope = ClusterResourceScope>
        + Metadata<Ty = ObjectMeta>
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Target of a read or delete by name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameInput {
    pub name: String,
    pub namespace: Option<NamespaceSelector>,
}

impl NameInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    pub fn in_namespace(mut self, namespace: NamespaceSelector) -> Self {
        self.namespace = Some(namespace);
        self
    }
}

impl From<&str> for NameInput {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for NameInput {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Body of a create or replace
///
/// Without an explicit namespace the resource's own `metadata.namespace`
/// is used, then the preferred one.
#[derive(Clone, Debug)]
pub struct ResourceInput<K> {
    pub resource: K,
    pub namespace: Option<NamespaceSelector>,
}

impl<K> ResourceInput<K> {
    pub fn in_namespace(mut self, namespace: NamespaceSelector) -> Self {
        self.namespace = Some(namespace);
        self
    }
}

impl<K> From<K> for ResourceInput<K> {
    fn from(resource: K) -> Self {
        Self {
            resource,
            namespace: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PatchInput {
    pub name: String,
    pub namespace: Option<NamespaceSelector>,
    pub patch: Patch,
}

impl PatchInput {
    pub fn new(name: impl Into<String>, patch: Patch) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            patch,
        }
    }

    pub fn in_namespace(mut self, namespace: NamespaceSelector) -> Self {
        self.namespace = Some(namespace);
        self
    }
}

/// Operator install or uninstall request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperatorInput {
    pub name: String,
    pub query: InstallQuery,
}

impl OperatorInput {
    /// Block until the operator settles, for at most `timeout_ms`
    pub fn wait(mut self, timeout_ms: Option<u64>) -> Self {
        self.query.wait = Some(true);
        self.query.timeout_ms = timeout_ms;
        self
    }
}

impl From<&str> for OperatorInput {
    fn from(name: &str) -> Self {
        Self {
            name: name.to_string(),
            query: InstallQuery::default(),
        }
    }
}

impl From<String> for OperatorInput {
    fn from(name: String) -> Self {
        Self {
            name,
            query: InstallQuery::default(),
        }
    }
}

// ============================================================================
// Namespace-following queries
// ============================================================================

type Builder<T> = Arc<dyn Fn(&NamespaceSelector) -> Query<T> + Send + Sync>;

struct Scoped<T> {
    query: Query<T>,
    follow: Option<watch::Receiver<NamespaceSelector>>,
}

/// A namespaced query
///
/// Built without an explicit namespace, it follows the preferred namespace
/// of the [`ClusterContext`]. Every read checks the context first, so a
/// namespace switch is visible on the next `state()` or `data()` call.
pub struct ScopedQuery<T> {
    inner: Mutex<Scoped<T>>,
    build: Builder<T>,
}

impl<T: Send + Sync + 'static> ScopedQuery<T> {
    fn new(build: Builder<T>, explicit: Option<NamespaceSelector>, context: &ClusterContext) -> Self {
        let scoped = match explicit {
            Some(selector) => Scoped {
                query: build(&selector),
                follow: None,
            },
            None => {
                let mut follow = context.watch();
                let selector = follow.borrow_and_update().clone();
                Scoped {
                    query: build(&selector),
                    follow: Some(follow),
                }
            }
        };
        Self {
            inner: Mutex::new(scoped),
            build,
        }
    }

    /// Move to the preferred namespace if it changed since the last look
    ///
    /// Returns true when the query was re-keyed.
    pub fn sync(&self) -> bool {
        let mut inner = self.inner.lock();
        let Some(follow) = inner.follow.as_mut() else {
            return false;
        };
        if !follow.has_changed().unwrap_or(false) {
            return false;
        }

        let selector = follow.borrow_and_update().clone();
        // Build first so an unchanged key keeps its entry alive
        let next = (self.build)(&selector);
        inner.query = next;
        true
    }

    /// Whether this query follows the preferred namespace
    pub fn is_following(&self) -> bool {
        self.inner.lock().follow.is_some()
    }

    pub fn key(&self) -> QueryKey {
        self.sync();
        self.inner.lock().query.key().clone()
    }

    pub fn state(&self) -> QueryState<T> {
        self.sync();
        self.inner.lock().query.state()
    }

    pub fn data(&self) -> Option<Arc<T>> {
        self.state().data
    }

    pub fn error(&self) -> Option<Arc<ApiError>> {
        self.state().error
    }

    /// Wait for new data or a namespace change
    pub async fn changed(&mut self) -> QueryState<T> {
        self.sync();

        let inner = self.inner.get_mut();
        let Some(follow) = inner.follow.as_mut() else {
            return inner.query.changed().await;
        };

        let namespace_changed = tokio::select! {
            state = inner.query.changed() => return state,
            result = follow.changed() => result.is_ok(),
        };

        if namespace_changed {
            self.sync();
        } else {
            // The context is gone; keep the current key
            self.inner.get_mut().follow = None;
        }
        self.inner.get_mut().query.state()
    }

    /// Wait until the current key has a settled result
    pub async fn settled(&mut self) -> QueryState<T> {
        self.sync();
        self.inner.get_mut().query.settled().await
    }

    pub fn refetch(&self) {
        self.sync();
        self.inner.lock().query.refetch();
    }
}

impl<T> std::fmt::Debug for ScopedQuery<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ScopedQuery")
            .field("current", &inner.query)
            .field("following", &inner.follow.is_some())
            .finish()
    }
}

// ============================================================================
// Hooks
// ============================================================================

/// Cached reads and invalidating writes for every supported resource
///
/// Cheap to clone; clones share the cache and the namespace context.
#[derive(Clone, Debug)]
pub struct Hooks {
    client: KubernetesClient,
    operators: OperatorClient,
    queries: QueryClient,
    context: ClusterContext,
}

fn single_namespace(selector: NamespaceSelector, what: &str) -> Result<String, ApiError> {
    match selector {
        NamespaceSelector::Named(ns) => Ok(ns),
        NamespaceSelector::AllNamespaces => Err(ApiError::InvalidRequest(format!(
            "{} needs a single namespace",
            what
        ))),
    }
}

impl Hooks {
    pub fn new(
        client: KubernetesClient,
        operators: OperatorClient,
        queries: QueryClient,
        context: ClusterContext,
    ) -> Self {
        Self {
            client,
            operators,
            queries,
            context,
        }
    }

    /// Wire everything from one transport client
    pub fn from_api(api: ApiClient, ops_path: &str, policies: CachePolicies, preferred: NamespaceSelector) -> Self {
        Self::new(
            KubernetesClient::new(api.clone()),
            OperatorClient::new(api, ops_path),
            QueryClient::new(policies),
            ClusterContext::new(preferred),
        )
    }

    /// Build the HTTP stack described by `config`
    pub fn from_config(config: &DeckConfig, preferred: NamespaceSelector) -> Result<Self, ApiError> {
        let api = ApiClient::from_config(&config.server)?;
        Ok(Self::from_api(
            api,
            &config.server.ops_path,
            CachePolicies::from_config(&config.cache),
            preferred,
        ))
    }

    pub fn context(&self) -> &ClusterContext {
        &self.context
    }

    pub fn query_client(&self) -> &QueryClient {
        &self.queries
    }

    /// Explicit namespace of a write, else the preferred one
    fn write_namespace(&self, explicit: Option<&NamespaceSelector>, what: &str) -> Result<String, ApiError> {
        single_namespace(self.context.resolve(explicit), what)
    }

    // ========================================================================
    // Namespaced reads
    // ========================================================================

    /// List `K` in a namespace, or across all of them
    pub fn list<K: NamespacedResource>(&self, namespace: Option<NamespaceSelector>) -> ScopedQuery<ObjectList<K>> {
        let hooks = self.clone();
        let build: Builder<ObjectList<K>> = Arc::new(move |selector| hooks.list_query::<K>(selector));
        ScopedQuery::new(build, namespace, &self.context)
    }

    fn list_query<K: NamespacedResource>(&self, selector: &NamespaceSelector) -> Query<ObjectList<K>> {
        let api = self.client.resource::<K>();
        let key = QueryKey::new(cache_kind::<K>(), Verb::List, KeyScope::from(selector));
        let selector = selector.clone();

        self.queries.subscribe(key, ResourceClass::Standard, move || {
            let api = api.clone();
            let selector = selector.clone();
            async move {
                match selector {
                    NamespaceSelector::Named(ns) => api.list_namespaced(Params::namespaced(ns)).await,
                    NamespaceSelector::AllNamespaces => api.list_for_all_namespaces(Params::new()).await,
                }
            }
        })
    }

    /// Read one `K` by name
    ///
    /// A name only identifies an object within one namespace, so
    /// `AllNamespaces` settles with an error.
    pub fn get<K: NamespacedResource>(&self, name: &str, namespace: Option<NamespaceSelector>) -> ScopedQuery<K> {
        let hooks = self.clone();
        let name = name.to_string();
        let build: Builder<K> = Arc::new(move |selector| hooks.get_query::<K>(&name, selector));
        ScopedQuery::new(build, namespace, &self.context)
    }

    fn get_query<K: NamespacedResource>(&self, name: &str, selector: &NamespaceSelector) -> Query<K> {
        let api = self.client.resource::<K>();
        let key = QueryKey::new(cache_kind::<K>(), Verb::Read, KeyScope::from(selector)).with_name(name);
        let selector = selector.clone();
        let name = name.to_string();

        self.queries.subscribe(key, ResourceClass::Standard, move || {
            let api = api.clone();
            let target = single_namespace(selector.clone(), "read").map(|ns| (ns, name.clone()));
            async move {
                let (ns, name) = target?;
                api.read_namespaced(Params::named(ns, name)).await
            }
        })
    }

    /// Container logs of one pod, cached per query
    pub fn pod_logs(&self, name: &str, namespace: Option<NamespaceSelector>, query: LogQuery) -> ScopedQuery<String> {
        let hooks = self.clone();
        let name = name.to_string();
        let build: Builder<String> =
            Arc::new(move |selector| hooks.pod_logs_query(&name, selector, query.clone()));
        ScopedQuery::new(build, namespace, &self.context)
    }

    fn pod_logs_query(&self, name: &str, selector: &NamespaceSelector, query: LogQuery) -> Query<String> {
        let api = self.client.pods();
        let discriminator = serde_json::to_string(&query).unwrap_or_default();
        let key = QueryKey::new(cache_kind::<Pod>(), Verb::ReadLog, KeyScope::from(selector))
            .with_name(name)
            .with_discriminator(discriminator);
        let selector = selector.clone();
        let name = name.to_string();

        self.queries.subscribe(key, ResourceClass::Standard, move || {
            let api = api.clone();
            let query = query.clone();
            let target = single_namespace(selector.clone(), "logs").map(|ns| (ns, name.clone()));
            async move {
                let (ns, name) = target?;
                api.read_namespaced_log(Params::named(ns, name).with_query(query))
                    .await
            }
        })
    }

    // ========================================================================
    // Namespaced writes
    // ========================================================================

    /// Create a `K`; invalidates every cached `K` read
    pub fn create<K: NamespacedResource>(&self) -> Mutation<ResourceInput<K>, K> {
        let api = self.client.resource::<K>();
        let hooks = self.clone();

        Mutation::new(
            format!("create {}", K::KIND),
            self.queries.clone(),
            InvalidationPolicy::kind(cache_kind::<K>()),
            move |input: ResourceInput<K>| {
                let api = api.clone();
                let namespace = input
                    .namespace
                    .clone()
                    .or_else(|| input.resource.metadata().namespace.clone().map(NamespaceSelector::Named));
                let namespace = hooks.write_namespace(namespace.as_ref(), "create");
                async move {
                    let params = Params::namespaced(namespace?).with_body(input.resource);
                    api.create_namespaced(params).await
                }
            },
        )
    }

    /// Replace a `K`, named by its `metadata.name`
    pub fn replace<K: NamespacedResource>(&self) -> Mutation<ResourceInput<K>, K> {
        let api = self.client.resource::<K>();
        let hooks = self.clone();

        Mutation::new(
            format!("replace {}", K::KIND),
            self.queries.clone(),
            InvalidationPolicy::kind(cache_kind::<K>()),
            move |input: ResourceInput<K>| {
                let api = api.clone();
                let namespace = input
                    .namespace
                    .clone()
                    .or_else(|| input.resource.metadata().namespace.clone().map(NamespaceSelector::Named));
                let namespace = hooks.write_namespace(namespace.as_ref(), "replace");
                let name = input.resource.metadata().name.clone();
                async move {
                    let name = name.ok_or_else(|| {
                        ApiError::InvalidRequest("replace needs metadata.name".to_string())
                    })?;
                    let params = Params::at(NamedPath {
                        namespace: namespace?,
                        name,
                    })
                    .with_body(input.resource);
                    api.replace_namespaced(params).await
                }
            },
        )
    }

    pub fn patch<K: NamespacedResource>(&self) -> Mutation<PatchInput, K> {
        let api = self.client.resource::<K>();
        let hooks = self.clone();

        Mutation::new(
            format!("patch {}", K::KIND),
            self.queries.clone(),
            InvalidationPolicy::kind(cache_kind::<K>()),
            move |input: PatchInput| {
                let api = api.clone();
                let namespace = hooks.write_namespace(input.namespace.as_ref(), "patch");
                async move {
                    let params = Params::named(namespace?, input.name).with_body(input.patch);
                    api.patch_namespaced(params).await
                }
            },
        )
    }

    pub fn delete<K: NamespacedResource>(&self) -> Mutation<NameInput, DeleteResponse<K>> {
        let api = self.client.resource::<K>();
        let hooks = self.clone();

        Mutation::new(
            format!("delete {}", K::KIND),
            self.queries.clone(),
            InvalidationPolicy::kind(cache_kind::<K>()),
            move |input: NameInput| {
                let api = api.clone();
                let namespace = hooks.write_namespace(input.namespace.as_ref(), "delete");
                async move { api.delete_namespaced(Params::named(namespace?, input.name)).await }
            },
        )
    }

    // ========================================================================
    // Cluster-scoped
    // ========================================================================

    pub fn list_cluster<K: ClusterResource>(&self) -> Query<ObjectList<K>> {
        let api = self.client.resource::<K>();
        let key = QueryKey::new(cache_kind::<K>(), Verb::List, KeyScope::Cluster);

        self.queries.subscribe(key, ResourceClass::Standard, move || {
            let api = api.clone();
            async move { api.list(Params::new()).await }
        })
    }

    pub fn get_cluster<K: ClusterResource>(&self, name: &str) -> Query<K> {
        let api = self.client.resource::<K>();
        let key = QueryKey::new(cache_kind::<K>(), Verb::Read, KeyScope::Cluster).with_name(name);
        let name = name.to_string();

        self.queries.subscribe(key, ResourceClass::Standard, move || {
            let api = api.clone();
            let name = name.clone();
            async move { api.read(Params::cluster_named(name)).await }
        })
    }

    pub fn create_cluster<K: ClusterResource>(&self) -> Mutation<K, K> {
        let api = self.client.resource::<K>();

        Mutation::new(
            format!("create {}", K::KIND),
            self.queries.clone(),
            InvalidationPolicy::kind(cache_kind::<K>()),
            move |resource: K| {
                let api = api.clone();
                async move { api.create(Params::new().with_body(resource)).await }
            },
        )
    }

    pub fn replace_cluster<K: ClusterResource>(&self) -> Mutation<K, K> {
        let api = self.client.resource::<K>();

        Mutation::new(
            format!("replace {}", K::KIND),
            self.queries.clone(),
            InvalidationPolicy::kind(cache_kind::<K>()),
            move |resource: K| {
                let api = api.clone();
                let name = resource.metadata().name.clone();
                async move {
                    let name = name.ok_or_else(|| {
                        ApiError::InvalidRequest("replace needs metadata.name".to_string())
                    })?;
                    let params = Params::at(ClusterNamedPath { name }).with_body(resource);
                    api.replace(params).await
                }
            },
        )
    }

    pub fn patch_cluster<K: ClusterResource>(&self) -> Mutation<PatchInput, K> {
        let api = self.client.resource::<K>();

        Mutation::new(
            format!("patch {}", K::KIND),
            self.queries.clone(),
            InvalidationPolicy::kind(cache_kind::<K>()),
            move |input: PatchInput| {
                let api = api.clone();
                async move {
                    if input.namespace.is_some() {
                        return Err(ApiError::InvalidRequest(format!(
                            "{} is cluster-scoped",
                            K::KIND
                        )));
                    }
                    api.patch(Params::cluster_named(input.name).with_body(input.patch))
                        .await
                }
            },
        )
    }

    pub fn delete_cluster<K: ClusterResource>(&self) -> Mutation<String, DeleteResponse<K>> {
        let api = self.client.resource::<K>();

        Mutation::new(
            format!("delete {}", K::KIND),
            self.queries.clone(),
            InvalidationPolicy::kind(cache_kind::<K>()),
            move |name: String| {
                let api = api.clone();
                async move { api.delete(Params::cluster_named(name)).await }
            },
        )
    }

    // ========================================================================
    // Dynamic kinds
    // ========================================================================

    /// List any kind by its descriptor, as untyped JSON
    ///
    /// Cluster kinds ignore the namespace.
    pub fn list_kind(&self, kind: ResourceKind, namespace: Option<NamespaceSelector>) -> ScopedQuery<ObjectList<Value>> {
        let hooks = self.clone();
        let build: Builder<ObjectList<Value>> = Arc::new(move |selector| hooks.list_kind_query(kind, selector));
        ScopedQuery::new(build, namespace, &self.context)
    }

    fn list_kind_query(&self, kind: ResourceKind, selector: &NamespaceSelector) -> Query<ObjectList<Value>> {
        let (scope, key_scope, path) = match (kind.namespaced, selector) {
            (false, _) => (OperationScope::Cluster, KeyScope::Cluster, ResourcePath::default()),
            (true, NamespaceSelector::AllNamespaces) => (
                OperationScope::AllNamespaces,
                KeyScope::AllNamespaces,
                ResourcePath::default(),
            ),
            (true, NamespaceSelector::Named(ns)) => (
                OperationScope::Namespaced,
                KeyScope::Namespace(ns.clone()),
                NamespacePath { namespace: ns.clone() }.into(),
            ),
        };
        // Untyped entries must not collide with typed ones of the same kind
        let key = QueryKey::new(kind.qualified_kind(), Verb::List, key_scope).with_discriminator("dynamic");
        let client = self.client.clone();

        self.queries.subscribe(key, ResourceClass::Standard, move || {
            let client = client.clone();
            let request = OperationRequest::new(path.clone());
            async move { client.execute(&kind, Verb::List, scope, request).await }
        })
    }

    pub fn get_kind(&self, kind: ResourceKind, name: &str, namespace: Option<NamespaceSelector>) -> ScopedQuery<Value> {
        let hooks = self.clone();
        let name = name.to_string();
        let build: Builder<Value> = Arc::new(move |selector| hooks.get_kind_query(kind, &name, selector));
        ScopedQuery::new(build, namespace, &self.context)
    }

    fn get_kind_query(&self, kind: ResourceKind, name: &str, selector: &NamespaceSelector) -> Query<Value> {
        let (scope, key_scope) = if kind.namespaced {
            (OperationScope::Namespaced, KeyScope::from(selector))
        } else {
            (OperationScope::Cluster, KeyScope::Cluster)
        };
        let key = QueryKey::new(kind.qualified_kind(), Verb::Read, key_scope)
            .with_name(name)
            .with_discriminator("dynamic");
        let client = self.client.clone();
        let selector = selector.clone();
        let name = name.to_string();

        self.queries.subscribe(key, ResourceClass::Standard, move || {
            let client = client.clone();
            let namespace = if kind.namespaced {
                single_namespace(selector.clone(), "read").map(Some)
            } else {
                Ok(None)
            };
            let name = name.clone();
            async move {
                let path = ResourcePath {
                    namespace: namespace?,
                    name: Some(name),
                };
                client
                    .execute(&kind, Verb::Read, scope, OperationRequest::new(path))
                    .await
            }
        })
    }

    /// Delete any kind by name; the response is the deleted object or a status
    pub fn delete_kind(&self, kind: ResourceKind) -> Mutation<NameInput, Value> {
        let client = self.client.clone();
        let hooks = self.clone();

        Mutation::new(
            format!("delete {}", kind.kind),
            self.queries.clone(),
            InvalidationPolicy::kind(kind.qualified_kind()),
            move |input: NameInput| {
                let client = client.clone();
                let (scope, namespace) = if kind.namespaced {
                    (
                        OperationScope::Namespaced,
                        hooks.write_namespace(input.namespace.as_ref(), "delete").map(Some),
                    )
                } else {
                    (OperationScope::Cluster, Ok(None))
                };
                async move {
                    let path = ResourcePath {
                        namespace: namespace?,
                        name: Some(input.name),
                    };
                    client
                        .execute(&kind, Verb::Delete, scope, OperationRequest::new(path))
                        .await
                }
            },
        )
    }

    // ========================================================================
    // Operators and health
    // ========================================================================

    /// Installed and installable operators, refreshed on the status schedule
    pub fn operators(&self) -> Query<ObjectList<Operator>> {
        let operators = self.operators.clone();
        let key = QueryKey::new(OPERATOR_KIND, Verb::List, KeyScope::Cluster);

        self.queries.subscribe(key, ResourceClass::Status, move || {
            let operators = operators.clone();
            async move { operators.list().await }
        })
    }

    pub fn cluster_health(&self) -> Query<ClusterHealth> {
        let operators = self.operators.clone();
        let key = QueryKey::new(HEALTH_KIND, Verb::Read, KeyScope::Cluster);

        self.queries.subscribe(key, ResourceClass::Status, move || {
            let operators = operators.clone();
            async move { operators.cluster_health().await }
        })
    }

    pub fn install_operator(&self) -> Mutation<OperatorInput, Operator> {
        let operators = self.operators.clone();

        Mutation::new(
            "install operator",
            self.queries.clone(),
            operator_policy(),
            move |input: OperatorInput| {
                let operators = operators.clone();
                async move { operators.install(&input.name, &input.query).await }
            },
        )
    }

    pub fn uninstall_operator(&self) -> Mutation<OperatorInput, Operator> {
        let operators = self.operators.clone();

        Mutation::new(
            "uninstall operator",
            self.queries.clone(),
            operator_policy(),
            move |input: OperatorInput| {
                let operators = operators.clone();
                async move { operators.uninstall(&input.name, &input.query).await }
            },
        )
    }
}

fn operator_policy() -> InvalidationPolicy {
    InvalidationPolicy::kind(OPERATOR_KIND).and(KeyPattern::kind(HEALTH_KIND))
}
