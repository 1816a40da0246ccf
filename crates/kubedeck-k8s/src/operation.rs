use std::fmt;

use k8s_openapi::Resource;
use kubedeck_transport::Method;

use crate::Scope;

// ============================================================================
// Verbs and scopes
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verb {
    List,
    Read,
    ReadStatus,
    Create,
    Replace,
    Patch,
    Delete,
    DeleteCollection,
    Watch,
    ReadLog,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::List => "list",
            Verb::Read => "read",
            Verb::ReadStatus => "readStatus",
            Verb::Create => "create",
            Verb::Replace => "replace",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
            Verb::DeleteCollection => "deleteCollection",
            Verb::Watch => "watch",
            Verb::ReadLog => "readLog",
        }
    }

    /// Whether the verb changes server state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Verb::Create | Verb::Replace | Verb::Patch | Verb::Delete | Verb::DeleteCollection
        )
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an operation applies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationScope {
    /// One namespace of a namespaced kind
    Namespaced,
    /// Every namespace of a namespaced kind
    AllNamespaces,
    /// A cluster-scoped kind
    Cluster,
}

impl fmt::Display for OperationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationScope::Namespaced => "namespaced",
            OperationScope::AllNamespaces => "all-namespaces",
            OperationScope::Cluster => "cluster",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Operation table
// ============================================================================

/// Shape of a successful response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    /// `ObjectList<K>`
    List,
    /// `K`
    Item,
    /// `K`, or a `Status` when the server deletes immediately
    ItemOrStatus,
    /// `StatusBody`
    Status,
    /// `WatchEvent<K>`
    Event,
    /// Plain text
    Text,
}

/// One row of the operation table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperationSpec {
    pub verb: Verb,
    pub scope: OperationScope,

    /// A resource name is part of the path
    pub named: bool,

    /// A request body is required
    pub body: bool,

    pub subresource: Option<&'static str>,

    /// Adds `watch=true` to the query
    pub watch: bool,

    pub response: ResponseKind,
}

impl OperationSpec {
    pub fn method(&self) -> Method {
        match self.verb {
            Verb::List | Verb::Read | Verb::ReadStatus | Verb::Watch | Verb::ReadLog => Method::GET,
            Verb::Create => Method::POST,
            Verb::Replace => Method::PUT,
            Verb::Patch => Method::PATCH,
            Verb::Delete | Verb::DeleteCollection => Method::DELETE,
        }
    }
}

const fn row(
    verb: Verb,
    scope: OperationScope,
    named: bool,
    body: bool,
    response: ResponseKind,
) -> OperationSpec {
    OperationSpec {
        verb,
        scope,
        named,
        body,
        subresource: None,
        watch: false,
        response,
    }
}

const fn sub(mut spec: OperationSpec, subresource: &'static str) -> OperationSpec {
    spec.subresource = Some(subresource);
    spec
}

const fn watch(mut spec: OperationSpec) -> OperationSpec {
    spec.watch = true;
    spec
}

use OperationScope::{AllNamespaces, Cluster, Namespaced};
use ResponseKind::{Event, Item, ItemOrStatus, List, Status, Text};

/// Every supported (verb, scope) pair and the request shape it requires
pub static OPERATIONS: &[OperationSpec] = &[
    row(Verb::List, Namespaced, false, false, List),
    row(Verb::List, AllNamespaces, false, false, List),
    row(Verb::List, Cluster, false, false, List),
    row(Verb::Read, Namespaced, true, false, Item),
    row(Verb::Read, Cluster, true, false, Item),
    sub(row(Verb::ReadStatus, Namespaced, true, false, Item), "status"),
    sub(row(Verb::ReadStatus, Cluster, true, false, Item), "status"),
    row(Verb::Create, Namespaced, false, true, Item),
    row(Verb::Create, Cluster, false, true, Item),
    row(Verb::Replace, Namespaced, true, true, Item),
    row(Verb::Replace, Cluster, true, true, Item),
    row(Verb::Patch, Namespaced, true, true, Item),
    row(Verb::Patch, Cluster, true, true, Item),
    row(Verb::Delete, Namespaced, true, false, ItemOrStatus),
    row(Verb::Delete, Cluster, true, false, ItemOrStatus),
    row(Verb::DeleteCollection, Namespaced, false, false, Status),
    row(Verb::DeleteCollection, Cluster, false, false, Status),
    watch(row(Verb::Watch, Namespaced, false, false, Event)),
    watch(row(Verb::Watch, AllNamespaces, false, false, Event)),
    watch(row(Verb::Watch, Cluster, false, false, Event)),
    sub(row(Verb::ReadLog, Namespaced, true, false, Text), "log"),
];

/// Look up the row for a (verb, scope) pair
pub fn operation(verb: Verb, scope: OperationScope) -> Option<&'static OperationSpec> {
    OPERATIONS
        .iter()
        .find(|spec| spec.verb == verb && spec.scope == scope)
}

/// Whether a name or namespace can stand alone as one URL path segment
pub(crate) fn is_path_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '?', '#', '%'])
}

// ============================================================================
// Resource kinds
// ============================================================================

/// API coordinates of a resource kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    /// Empty for the core group
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
    pub namespaced: bool,
}

impl ResourceKind {
    /// Coordinates of a k8s-openapi resource type
    pub const fn of<K>() -> Self
    where
        K: Resource,
        K::Scope: Scope,
    {
        Self {
            group: K::GROUP,
            version: K::VERSION,
            kind: K::KIND,
            plural: K::URL_PATH_SEGMENT,
            namespaced: <K::Scope as Scope>::NAMESPACED,
        }
    }

    /// Kind qualified by its group, e.g. `Event.events.k8s.io`
    ///
    /// Core kinds keep their bare name, so `Event` is the core one.
    pub fn qualified_kind(&self) -> String {
        if self.group.is_empty() {
            self.kind.to_string()
        } else {
            format!("{}.{}", self.kind, self.group)
        }
    }

    /// `v1` for the core group, `group/version` otherwise
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    fn api_prefix(&self) -> String {
        if self.group.is_empty() {
            format!("/api/{}", self.version)
        } else {
            format!("/apis/{}/{}", self.group, self.version)
        }
    }

    /// Path of a collection, in one namespace or across all of them
    pub fn collection_path(&self, namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) => format!("{}/namespaces/{}/{}", self.api_prefix(), ns, self.plural),
            None => format!("{}/{}", self.api_prefix(), self.plural),
        }
    }

    /// Path of a single object, optionally of one of its subresources
    pub fn item_path(&self, namespace: Option<&str>, name: &str, subresource: Option<&str>) -> String {
        let mut path = format!("{}/{}", self.collection_path(namespace), name);
        if let Some(sub) = subresource {
            path.push('/');
            path.push_str(sub);
        }
        path
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind)
    }
}
