//! Cached query and mutation hooks for kubedeck
//!
//! Reads are cached per [`QueryKey`] and revalidated according to the
//! [`StalenessPolicy`] of their resource class. Writes run as
//! [`Mutation`]s whose [`InvalidationPolicy`] is applied after every
//! success. [`Hooks`] is the surface callers use: one function per resource
//! per verb, with namespace resolution through a shared [`ClusterContext`].

mod cache;
mod context;
mod hooks;
mod key;
mod mutation;
mod policy;
mod query;

pub use cache::QueryClient;
pub use context::ClusterContext;
pub use hooks::{
    ClusterResource, Hooks, NameInput, NamespacedResource, OperatorInput, PatchInput, ResourceInput,
    ScopedQuery,
};
pub use key::{KeyPattern, KeyScope, QueryKey};
pub use mutation::{Mutation, MutationState, MutationStatus};
pub use policy::{CachePolicies, InvalidationPolicy, ResourceClass, StalenessPolicy};
pub use query::{Query, QueryState, QueryStatus};

// Re-export types used in our public API
pub use kubedeck_k8s::{ApiError, DeleteResponse, LogQuery, Patch, ResourceKind, Verb};
pub use kubedeck_types::{NamespaceSelector, ObjectList};
