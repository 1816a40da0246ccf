use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::json;

use kubedeck_query::{CachePolicies, Hooks, NamespaceSelector, NameInput, QueryStatus};
use kubedeck_transport::test_utils::{FakeApiServer, Fault};
use kubedeck_transport::{Method, RawResponse};

const CONFIG_MAPS: &str = "/api/v1/namespaces/default/configmaps";
const ALL_CONFIG_MAPS: &str = "/api/v1/configmaps";

fn setup() -> (FakeApiServer, Hooks) {
    let server = FakeApiServer::new();
    let hooks = Hooks::from_api(
        server.client(),
        "/ops",
        CachePolicies::default(),
        NamespaceSelector::Named("default".to_string()),
    );
    (server, hooks)
}

fn named(ns: &str) -> Option<NamespaceSelector> {
    Some(NamespaceSelector::Named(ns.to_string()))
}

fn seed_config_maps(server: &FakeApiServer) {
    for name in ["app-config", "redis-config", "empty-config"] {
        server.seed(CONFIG_MAPS, json!({"metadata": {"name": name}}));
    }
    server.seed(
        "/api/v1/namespaces/kube-system/configmaps",
        json!({"metadata": {"name": "coredns"}}),
    );
}

fn names<K: k8s_openapi::Metadata<Ty = ObjectMeta>>(items: &[K]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item.metadata().name.clone())
        .collect()
}

#[tokio::test]
async fn lists_seeded_config_maps_in_order() {
    let (server, hooks) = setup();
    seed_config_maps(&server);

    let mut query = hooks.config_maps(None);
    let state = query.settled().await;

    assert_eq!(state.status, QueryStatus::Success);
    assert_eq!(
        names(&state.data.unwrap().items),
        ["app-config", "redis-config", "empty-config"]
    );
}

#[tokio::test]
async fn all_namespaces_is_an_independent_entry() {
    let (server, hooks) = setup();
    seed_config_maps(&server);

    let mut default = hooks.config_maps(named("default"));
    let mut all = hooks.config_maps(Some(NamespaceSelector::AllNamespaces));
    let default_data = default.settled().await.data.unwrap();
    let all_data = all.settled().await.data.unwrap();

    assert_ne!(default.key(), all.key());
    assert!(!Arc::ptr_eq(&default_data, &all_data));
    assert_eq!(default_data.items.len(), 3);
    assert_eq!(all_data.items.len(), 4);
    assert_eq!(server.request_count(Method::GET, CONFIG_MAPS), 1);
    assert_eq!(server.request_count(Method::GET, ALL_CONFIG_MAPS), 1);
}

#[tokio::test]
async fn fresh_key_is_served_from_cache() {
    let (server, hooks) = setup();
    seed_config_maps(&server);

    let mut first = hooks.config_maps(None);
    let first_data = first.settled().await.data.unwrap();

    let mut second = hooks.config_maps(named("default"));
    let second_data = second.settled().await.data.unwrap();

    assert!(Arc::ptr_eq(&first_data, &second_data));
    assert_eq!(server.request_count(Method::GET, CONFIG_MAPS), 1);
}

#[tokio::test]
async fn mutation_invalidates_only_its_kind() {
    let (server, hooks) = setup();
    seed_config_maps(&server);
    server.seed(
        "/api/v1/namespaces/default/secrets",
        json!({"metadata": {"name": "db-password"}}),
    );

    let mut config_maps = hooks.config_maps(None);
    let mut all_config_maps = hooks.config_maps(Some(NamespaceSelector::AllNamespaces));
    let mut secrets = hooks.secrets(None);
    config_maps.settled().await;
    all_config_maps.settled().await;
    let secret_data = secrets.settled().await.data.unwrap();

    let resource = ConfigMap {
        metadata: ObjectMeta {
            name: Some("feature-flags".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    hooks.create_config_map().mutate(resource).await.unwrap();

    let state = config_maps.settled().await;
    assert_eq!(state.data.unwrap().items.len(), 4);
    let state = all_config_maps.settled().await;
    assert_eq!(state.data.unwrap().items.len(), 5);

    assert!(Arc::ptr_eq(&secret_data, &secrets.data().unwrap()));
    assert_eq!(
        server.request_count(Method::GET, "/api/v1/namespaces/default/secrets"),
        1
    );
    assert_eq!(server.request_count(Method::GET, CONFIG_MAPS), 2);
}

#[tokio::test]
async fn failures_leave_no_data() {
    let (server, hooks) = setup();
    seed_config_maps(&server);

    let cases = [
        ("app-config", Fault::status(500)),
        ("redis-config", Fault::status(403)),
        ("empty-config", Fault::network()),
        ("feature-flags", Fault::timeout()),
    ];
    for (name, fault) in cases {
        server.inject(fault.on_path(format!("{}/{}", CONFIG_MAPS, name)));
        let mut query = hooks.config_map(name, None);
        let state = query.settled().await;

        assert_eq!(state.status, QueryStatus::Error, "{}", name);
        assert!(state.data.is_none());
        assert!(state.error.is_some());
    }

    let mut timed_out = hooks.config_map("feature-flags", None);
    assert!(timed_out.settled().await.error.unwrap().is_transport());

    let mut missing = hooks.config_map("does-not-exist", None);
    let state = missing.settled().await;
    assert!(state.data.is_none());
    assert!(state.error.unwrap().is_not_found());
}

#[tokio::test]
async fn created_secret_reads_back_with_server_fields() {
    let (_server, hooks) = setup();

    let resource = Secret {
        metadata: ObjectMeta {
            name: Some("db-password".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        string_data: Some([("password".to_string(), "hunter2".to_string())].into()),
        ..Default::default()
    };
    hooks.create_secret().mutate(resource).await.unwrap();

    let mut query = hooks.secret("db-password", None);
    let secret = query.settled().await.data.unwrap();
    let meta = &secret.metadata;

    assert_eq!(meta.name.as_deref(), Some("db-password"));
    assert_eq!(meta.namespace.as_deref(), Some("default"));
    assert!(meta.uid.is_some());
    assert!(meta.resource_version.is_some());
    assert!(meta.creation_timestamp.is_some());
}

#[tokio::test]
async fn operators_refresh_after_install() {
    let (server, hooks) = setup();
    let installed = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&installed);
    server.route(Method::GET, "/ops/operators", move |_| {
        let phase = if flag.load(Ordering::SeqCst) {
            "Installed"
        } else {
            "NotInstalled"
        };
        RawResponse::json(200, &json!({"items": [{"name": "cert-manager", "phase": phase}]}))
    });
    let flag = Arc::clone(&installed);
    server.route(Method::POST, "/ops/operators/cert-manager/install", move |_| {
        flag.store(true, Ordering::SeqCst);
        RawResponse::json(200, &json!({"name": "cert-manager", "phase": "Installed"}))
    });

    let mut operators = hooks.operators();
    let before = operators.settled().await.data.unwrap();
    assert!(!before.items[0].is_installed());

    hooks.install_operator().mutate("cert-manager").await.unwrap();

    let after = operators.settled().await.data.unwrap();
    assert!(after.items[0].is_installed());
    assert_eq!(server.request_count(Method::GET, "/ops/operators"), 2);
}

#[tokio::test]
async fn failed_delete_keeps_item_listed() {
    let (server, hooks) = setup();
    let daemon_sets = "/apis/apps/v1/namespaces/default/daemonsets";
    server.seed(daemon_sets, json!({"metadata": {"name": "nginx-daemonset"}}));
    server.inject(Fault::status(500).on(Method::DELETE, daemon_sets));

    let mut list = hooks.list::<DaemonSet>(None);
    list.settled().await;

    let delete = hooks.delete_daemon_set();
    let err = delete.mutate("nginx-daemonset").await.unwrap_err();
    assert!(!err.to_string().is_empty());
    assert_eq!(err.status(), Some(500));

    assert!(!list.state().is_fetching);
    assert_eq!(names(&list.data().unwrap().items), ["nginx-daemonset"]);
    assert_eq!(server.objects(daemon_sets).len(), 1);
}

#[tokio::test]
async fn preferred_namespace_rekeys_following_queries() {
    let (server, hooks) = setup();
    seed_config_maps(&server);

    let mut following = hooks.config_maps(None);
    let mut pinned = hooks.config_maps(named("default"));
    following.settled().await;
    pinned.settled().await;

    hooks
        .context()
        .set_preferred_namespace(NamespaceSelector::Named("kube-system".to_string()));

    let state = following.settled().await;
    assert_eq!(following.key().to_string(), "ConfigMap/list/kube-system");
    assert_eq!(names(&state.data.unwrap().items), ["coredns"]);
    assert!(following.is_following());

    assert_eq!(pinned.key().to_string(), "ConfigMap/list/default");
    assert_eq!(pinned.data().unwrap().items.len(), 3);
}

#[tokio::test]
async fn explicit_namespace_on_write() {
    let (server, hooks) = setup();
    server.seed(
        "/api/v1/namespaces/kube-system/configmaps",
        json!({"metadata": {"name": "coredns"}}),
    );

    hooks
        .delete_config_map()
        .mutate(NameInput::new("coredns").in_namespace(NamespaceSelector::Named("kube-system".to_string())))
        .await
        .unwrap();
    assert!(server.objects("/api/v1/namespaces/kube-system/configmaps").is_empty());

    let err = hooks
        .delete_config_map()
        .mutate(NameInput::new("coredns").in_namespace(NamespaceSelector::AllNamespaces))
        .await
        .unwrap_err();
    assert!(err.status().is_none());
}

#[tokio::test]
async fn namespace_switch_is_visible_to_plain_reads() {
    let (server, hooks) = setup();
    seed_config_maps(&server);

    let mut warm = hooks.config_maps(named("kube-system"));
    warm.settled().await;

    let mut following = hooks.config_maps(None);
    following.settled().await;
    assert_eq!(following.data().unwrap().items.len(), 3);

    hooks
        .context()
        .set_preferred_namespace(NamespaceSelector::Named("kube-system".to_string()));

    assert_eq!(following.key().to_string(), "ConfigMap/list/kube-system");
    assert_eq!(names(&following.data().unwrap().items), ["coredns"]);
    assert_eq!(
        server.request_count(Method::GET, "/api/v1/namespaces/kube-system/configmaps"),
        1
    );
}
