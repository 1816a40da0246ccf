//! Typed Kubernetes resource facade for kubedeck
//!
//! Every REST operation goes through one generic executor,
//! [`KubernetesClient::execute`], driven by the [`OPERATIONS`] table.
//! [`ResourceApi`] layers compile-time checked methods on top of it, one per
//! operation and scope, and [`OperatorClient`] covers the operator-lifecycle
//! and health service.

mod client;
mod operation;
mod operators;
mod params;
mod scope;

pub use client::{KNOWN_KINDS, KnownKind, KubernetesClient, ResourceApi};
pub use operation::{OPERATIONS, OperationScope, OperationSpec, ResourceKind, ResponseKind, Verb};
pub use operators::{InstallQuery, OperatorClient};
pub use params::{
    ClusterNamedPath, DeleteQuery, DeleteResponse, ListQuery, LogQuery, NamedPath,
    NamespacePath, NoPath, OperationBody, OperationRequest, Params, Patch, ReadQuery,
    ResourcePath, WriteQuery,
};
pub use scope::{ClusterResourceScope, NamespaceResourceScope, Scope};

// Re-export types used in our public API
pub use kubedeck_transport::{ApiClient, ApiError};
pub use kubedeck_types::{ObjectList, StatusBody, WatchEvent};
