//! Named hooks per resource, generated from one list per scope

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Event, LimitRange, Namespace, Node, PersistentVolume,
    PersistentVolumeClaim, Pod, ResourceQuota, Secret, Service, ServiceAccount,
};
use k8s_openapi::api::networking::v1::{Ingress, NetworkPolicy};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::api::storage::v1::StorageClass;

use kubedeck_k8s::DeleteResponse;
use kubedeck_types::{NamespaceSelector, ObjectList};

use super::{Hooks, NameInput, PatchInput, ResourceInput, ScopedQuery};
use crate::{Mutation, Query};

macro_rules! namespaced_hooks {
    ($( $ty:ty => $list:ident, $get:ident, $create:ident, $update:ident, $patch:ident, $delete:ident; )*) => {
        impl Hooks {
            $(
                #[doc = concat!("List `", stringify!($ty), "` in a namespace, or across all of them")]
                pub fn $list(&self, namespace: Option<NamespaceSelector>) -> ScopedQuery<ObjectList<$ty>> {
                    self.list::<$ty>(namespace)
                }

                pub fn $get(&self, name: &str, namespace: Option<NamespaceSelector>) -> ScopedQuery<$ty> {
                    self.get::<$ty>(name, namespace)
                }

                pub fn $create(&self) -> Mutation<ResourceInput<$ty>, $ty> {
                    self.create::<$ty>()
                }

                pub fn $update(&self) -> Mutation<ResourceInput<$ty>, $ty> {
                    self.replace::<$ty>()
                }

                pub fn $patch(&self) -> Mutation<PatchInput, $ty> {
                    self.patch::<$ty>()
                }

                pub fn $delete(&self) -> Mutation<NameInput, DeleteResponse<$ty>> {
                    self.delete::<$ty>()
                }
            )*
        }
    };
}

macro_rules! cluster_hooks {
    ($( $ty:ty => $list:ident, $get:ident, $create:ident, $update:ident, $patch:ident, $delete:ident; )*) => {
        impl Hooks {
            $(
                #[doc = concat!("List every `", stringify!($ty), "`")]
                pub fn $list(&self) -> Query<ObjectList<$ty>> {
                    self.list_cluster::<$ty>()
                }

                pub fn $get(&self, name: &str) -> Query<$ty> {
                    self.get_cluster::<$ty>(name)
                }

                pub fn $create(&self) -> Mutation<$ty, $ty> {
                    self.create_cluster::<$ty>()
                }

                pub fn $update(&self) -> Mutation<$ty, $ty> {
                    self.replace_cluster::<$ty>()
                }

                pub fn $patch(&self) -> Mutation<PatchInput, $ty> {
                    self.patch_cluster::<$ty>()
                }

                pub fn $delete(&self) -> Mutation<String, DeleteResponse<$ty>> {
                    self.delete_cluster::<$ty>()
                }
            )*
        }
    };
}

namespaced_hooks! {
    ConfigMap => config_maps, config_map, create_config_map, update_config_map, patch_config_map, delete_config_map;
    Secret => secrets, secret, create_secret, update_secret, patch_secret, delete_secret;
    Pod => pods, pod, create_pod, update_pod, patch_pod, delete_pod;
    Service => services, service, create_service, update_service, patch_service, delete_service;
    ServiceAccount => service_accounts, service_account, create_service_account, update_service_account, patch_service_account, delete_service_account;
    Endpoints => endpoints, endpoint, create_endpoints, update_endpoints, patch_endpoints, delete_endpoints;
    Event => events, event, create_event, update_event, patch_event, delete_event;
    LimitRange => limit_ranges, limit_range, create_limit_range, update_limit_range, patch_limit_range, delete_limit_range;
    ResourceQuota => resource_quotas, resource_quota, create_resource_quota, update_resource_quota, patch_resource_quota, delete_resource_quota;
    PersistentVolumeClaim => persistent_volume_claims, persistent_volume_claim, create_persistent_volume_claim, update_persistent_volume_claim, patch_persistent_volume_claim, delete_persistent_volume_claim;
    Deployment => deployments, deployment, create_deployment, update_deployment, patch_deployment, delete_deployment;
    DaemonSet => daemon_sets, daemon_set, create_daemon_set, update_daemon_set, patch_daemon_set, delete_daemon_set;
    StatefulSet => stateful_sets, stateful_set, create_stateful_set, update_stateful_set, patch_stateful_set, delete_stateful_set;
    ReplicaSet => replica_sets, replica_set, create_replica_set, update_replica_set, patch_replica_set, delete_replica_set;
    Job => jobs, job, create_job, update_job, patch_job, delete_job;
    CronJob => cron_jobs, cron_job, create_cron_job, update_cron_job, patch_cron_job, delete_cron_job;
    Ingress => ingresses, ingress, create_ingress, update_ingress, patch_ingress, delete_ingress;
    NetworkPolicy => network_policies, network_policy, create_network_policy, update_network_policy, patch_network_policy, delete_network_policy;
    Role => roles, role, create_role, update_role, patch_role, delete_role;
    RoleBinding => role_bindings, role_binding, create_role_binding, update_role_binding, patch_role_binding, delete_role_binding;
}

cluster_hooks! {
    Namespace => namespaces, namespace, create_namespace, update_namespace, patch_namespace, delete_namespace;
    Node => nodes, node, create_node, update_node, patch_node, delete_node;
    PersistentVolume => persistent_volumes, persistent_volume, create_persistent_volume, update_persistent_volume, patch_persistent_volume, delete_persistent_volume;
    StorageClass => storage_classes, storage_class, create_storage_class, update_storage_class, patch_storage_class, delete_storage_class;
    ClusterRole => cluster_roles, cluster_role, create_cluster_role, update_cluster_role, patch_cluster_role, delete_cluster_role;
    ClusterRoleBinding => cluster_role_bindings, cluster_role_binding, create_cluster_role_binding, update_cluster_role_binding, patch_cluster_role_binding, delete_cluster_role_binding;
}
