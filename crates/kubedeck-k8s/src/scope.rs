pub use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};

/// Whether a resource lives inside a namespace
///
/// Implemented for the two k8s-openapi scopes of top-level resources, which
/// lets the facade pick URL layouts and restrict methods at compile time.
pub trait Scope {
    const NAMESPACED: bool;
}

impl Scope for ClusterResourceScope {
    const NAMESPACED: bool = false;
}

impl Scope for NamespaceResourceScope {
    const NAMESPACED: bool = true;
}
