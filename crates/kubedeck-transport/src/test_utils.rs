//! In-memory stand-in for the control plane, for tests
//!
//! `FakeApiServer` implements [`Transport`] over a Kubernetes-style object
//! store keyed by collection path. It understands the path layout of the
//! core and named API groups, namespaced and cluster scope, the `status`
//! and `log` subresources, and single-event watches. Anything else can be
//! served with [`FakeApiServer::route`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value, json};

use kubedeck_types::StatusBody;

use crate::{ApiClient, ApiError, ApiRequest, Method, RawResponse, RequestBody, Transport};

type Handler = Arc<dyn Fn(&ApiRequest) -> RawResponse + Send + Sync>;

/// What an injected fault answers with
#[derive(Clone, Debug)]
enum FaultResponse {
    Status(u16, Option<Value>),
    Network,
    Timeout,
}

/// A failure injected into matching requests
#[derive(Clone, Debug)]
pub struct Fault {
    method: Option<Method>,
    path: Option<String>,
    response: FaultResponse,
    remaining: Option<usize>,
}

impl Fault {
    /// Answer with an HTTP status and an empty body
    pub fn status(code: u16) -> Self {
        Self::new(FaultResponse::Status(code, None))
    }

    /// Answer with an HTTP status and a JSON body
    pub fn status_with_body(code: u16, body: Value) -> Self {
        Self::new(FaultResponse::Status(code, Some(body)))
    }

    /// Fail as if the connection was refused
    pub fn network() -> Self {
        Self::new(FaultResponse::Network)
    }

    /// Fail as if the request timed out
    pub fn timeout() -> Self {
        Self::new(FaultResponse::Timeout)
    }

    fn new(response: FaultResponse) -> Self {
        Self {
            method: None,
            path: None,
            response,
            remaining: None,
        }
    }

    /// Only match requests with this method whose endpoint starts with `path`
    pub fn on(mut self, method: Method, path: impl Into<String>) -> Self {
        self.method = Some(method);
        self.path = Some(path.into());
        self
    }

    /// Only match requests whose endpoint starts with `path`
    pub fn on_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Stop failing after `n` matches
    pub fn times(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }

    fn matches(&self, request: &ApiRequest) -> bool {
        self.method.as_ref().is_none_or(|m| *m == request.method)
            && self
                .path
                .as_deref()
                .is_none_or(|p| request.endpoint.starts_with(p))
    }

    fn answer(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        match &self.response {
            FaultResponse::Status(code, Some(body)) => Ok(RawResponse::json(*code, body)),
            FaultResponse::Status(code, None) => Ok(RawResponse::text(*code, "")),
            FaultResponse::Network => Err(ApiError::Network("connection refused".to_string())),
            FaultResponse::Timeout => Err(ApiError::Timeout(request.timeout)),
        }
    }
}

struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// Path of a request split into its Kubernetes parts
#[derive(Clone, Debug, PartialEq, Eq)]
struct ResourcePath {
    /// `/api/v1/configmaps`, `/apis/apps/v1/daemonsets`, ... without namespace
    collection: String,
    plural: String,
    namespace: Option<String>,
    name: Option<String>,
    subresource: Option<String>,
}

fn parse_path(endpoint: &str) -> Option<ResourcePath> {
    let segments: Vec<&str> = endpoint.split('/').filter(|s| !s.is_empty()).collect();

    let (prefix, rest) = match segments.as_slice() {
        ["api", version, rest @ ..] => (format!("/api/{}", version), rest),
        ["apis", group, version, rest @ ..] => (format!("/apis/{}/{}", group, version), rest),
        _ => return None,
    };

    // `namespaces/{ns}/status` is the namespace object's own subresource
    let (namespace, rest) = match rest {
        ["namespaces", ns, plural, ..] if !matches!(*plural, "status" | "finalize") => {
            (Some(ns.to_string()), &rest[2..])
        }
        _ => (None, rest),
    };

    let (plural, name, subresource) = match rest {
        [plural] => (plural, None, None),
        [plural, name] => (plural, Some(name.to_string()), None),
        [plural, name, sub] => (plural, Some(name.to_string()), Some(sub.to_string())),
        _ => return None,
    };

    Some(ResourcePath {
        collection: format!("{}/{}", prefix, plural),
        plural: plural.to_string(),
        namespace,
        name,
        subresource,
    })
}

#[derive(Default)]
struct State {
    collections: HashMap<String, Vec<Value>>,
    events: HashMap<String, Vec<Value>>,
    logs: HashMap<(String, String), String>,
    routes: Vec<Route>,
    faults: Vec<Fault>,
    requests: Vec<ApiRequest>,
    revision: u64,
    next_uid: u64,
}

/// In-memory Kubernetes-style API server
#[derive(Clone, Default)]
pub struct FakeApiServer {
    state: Arc<Mutex<State>>,
}

impl FakeApiServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// An [`ApiClient`] talking to this server
    pub fn client(&self) -> ApiClient {
        ApiClient::new(Arc::new(self.clone()), Duration::from_secs(30))
    }

    /// Store an object under a collection path, e.g.
    /// `/api/v1/namespaces/default/configmaps`
    ///
    /// Server-assigned metadata is filled in when missing. Returns the
    /// stored object.
    pub fn seed(&self, collection_path: &str, object: Value) -> Value {
        let path = parse_path(collection_path)
            .unwrap_or_else(|| panic!("not a resource path: {}", collection_path));
        let mut state = self.state.lock();
        let mut object = object;
        if let Some(ns) = &path.namespace {
            set_meta(&mut object, "namespace", Value::String(ns.clone()));
        }
        if meta_str(&object, "uid").is_none() {
            state.stamp_new(&mut object);
        }
        let items = state.collections.entry(path.collection).or_default();
        let key = object_key(&object);
        items.retain(|item| object_key(item) != key);
        items.push(object.clone());
        object
    }

    /// Current object at an item path, e.g.
    /// `/api/v1/namespaces/default/configmaps/app-config`
    pub fn object(&self, item_path: &str) -> Option<Value> {
        let path = parse_path(item_path)?;
        let state = self.state.lock();
        state.find(&path).map(|(_, obj)| obj.clone())
    }

    /// Objects stored under a collection path, in insertion order
    pub fn objects(&self, collection_path: &str) -> Vec<Value> {
        let Some(path) = parse_path(collection_path) else {
            return Vec::new();
        };
        let state = self.state.lock();
        state
            .collections
            .get(&path.collection)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| in_namespace(item, path.namespace.as_deref()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Text served by the `log` subresource of a pod
    pub fn set_pod_log(&self, namespace: &str, pod: &str, text: impl Into<String>) {
        self.state
            .lock()
            .logs
            .insert((namespace.to_string(), pod.to_string()), text.into());
    }

    /// Serve an exact method and path with a custom handler
    ///
    /// Routes are checked before the object store.
    pub fn route<F>(&self, method: Method, path: impl Into<String>, handler: F)
    where
        F: Fn(&ApiRequest) -> RawResponse + Send + Sync + 'static,
    {
        self.state.lock().routes.push(Route {
            method,
            path: path.into(),
            handler: Arc::new(handler),
        });
    }

    pub fn inject(&self, fault: Fault) {
        self.state.lock().faults.push(fault);
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// Every request received so far, faulted ones included
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of requests received for an exact method and endpoint
    pub fn request_count(&self, method: Method, endpoint: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.endpoint == endpoint)
            .count()
    }

    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }
}

impl std::fmt::Debug for FakeApiServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FakeApiServer")
            .field("collections", &state.collections.len())
            .field("requests", &state.requests.len())
            .finish()
    }
}

#[async_trait]
impl Transport for FakeApiServer {
    async fn execute(&self, request: ApiRequest) -> Result<RawResponse, ApiError> {
        let handler = {
            let mut state = self.state.lock();
            state.requests.push(request.clone());

            if let Some(fault) = state.take_fault(&request) {
                return fault.answer(&request);
            }

            state
                .routes
                .iter()
                .find(|r| r.method == request.method && r.path == request.endpoint)
                .map(|r| r.handler.clone())
        };

        // Handlers may call back into the server, so the lock is released first
        if let Some(handler) = handler {
            return Ok(handler(&request));
        }

        Ok(self.state.lock().handle(&request))
    }
}

// ============================================================================
// Request handling
// ============================================================================

impl State {
    fn take_fault(&mut self, request: &ApiRequest) -> Option<Fault> {
        let index = self.faults.iter().position(|f| f.matches(request))?;
        match self.faults[index].remaining {
            Some(n) if n <= 1 => Some(self.faults.remove(index)),
            Some(n) => {
                self.faults[index].remaining = Some(n - 1);
                Some(self.faults[index].clone())
            }
            None => Some(self.faults[index].clone()),
        }
    }

    fn handle(&mut self, request: &ApiRequest) -> RawResponse {
        let Some(path) = parse_path(&request.endpoint) else {
            return RawResponse::json(
                404,
                &json!({"error": format!("no route for {} {}", request.method, request.endpoint)}),
            );
        };

        let result = match (request.method.as_str(), path.name.is_some()) {
            ("GET", false) if request.query_value("watch") == Some("true") => {
                self.watch(&path, request)
            }
            ("GET", false) => self.list(&path, request),
            ("GET", true) => self.read(&path, request),
            ("POST", false) => self.create(&path, request),
            ("PUT", true) => self.replace(&path, request),
            ("PATCH", true) => self.patch(&path, request),
            ("DELETE", true) => self.delete(&path, request),
            ("DELETE", false) => self.delete_collection(&path, request),
            _ => Err(failure(
                405,
                "MethodNotAllowed",
                format!("{} is not supported on {}", request.method, request.endpoint),
            )),
        };

        result.unwrap_or_else(|response| response)
    }

    fn list(&self, path: &ResourcePath, request: &ApiRequest) -> Result<RawResponse, RawResponse> {
        let items = self.select(path, request)?;

        let offset: usize = request
            .query_value("continue")
            .and_then(|token| token.parse().ok())
            .unwrap_or(0);
        let limit: Option<usize> = request.query_value("limit").and_then(|l| l.parse().ok());

        let remaining: Vec<Value> = items.into_iter().skip(offset).collect();
        let (page, next) = match limit {
            Some(limit) if limit > 0 && remaining.len() > limit => (
                remaining[..limit].to_vec(),
                Some((offset + limit).to_string()),
            ),
            _ => (remaining, None),
        };

        let mut metadata = json!({"resourceVersion": self.revision.to_string()});
        if let Some(next) = next {
            metadata["continue"] = Value::String(next);
        }

        Ok(RawResponse::json(
            200,
            &json!({
                "apiVersion": "v1",
                "kind": "List",
                "metadata": metadata,
                "items": page,
            }),
        ))
    }

    fn read(&self, path: &ResourcePath, request: &ApiRequest) -> Result<RawResponse, RawResponse> {
        let (_, object) = self.find(path).ok_or_else(|| not_found(path))?;

        match path.subresource.as_deref() {
            None | Some("status") => Ok(RawResponse::json(200, object)),
            Some("log") => {
                let key = (
                    path.namespace.clone().unwrap_or_default(),
                    path.name.clone().unwrap_or_default(),
                );
                let text = self.logs.get(&key).cloned().unwrap_or_default();
                let text = match request
                    .query_value("tailLines")
                    .and_then(|n| n.parse::<usize>().ok())
                {
                    Some(n) => tail_lines(&text, n),
                    None => text,
                };
                Ok(RawResponse::text(200, text))
            }
            Some(other) => Err(failure(
                404,
                "NotFound",
                format!("the server could not find the requested resource ({})", other),
            )),
        }
    }

    fn create(&mut self, path: &ResourcePath, request: &ApiRequest) -> Result<RawResponse, RawResponse> {
        let mut object = json_object_body(request)?;

        if meta_str(&object, "name").is_none() {
            match meta_str(&object, "generateName") {
                Some(prefix) => {
                    let name = format!("{}{:05}", prefix, self.next_uid + 1);
                    set_meta(&mut object, "name", Value::String(name));
                }
                None => {
                    return Err(failure(
                        422,
                        "Invalid",
                        format!("{} is invalid: metadata.name: Required value", path.plural),
                    ));
                }
            }
        }

        if let Some(ns) = &path.namespace {
            if meta_str(&object, "namespace").is_some_and(|body_ns| body_ns != ns.as_str()) {
                return Err(failure(
                    400,
                    "BadRequest",
                    "the namespace of the provided object does not match the namespace sent on the request",
                ));
            }
            set_meta(&mut object, "namespace", Value::String(ns.clone()));
        }

        let name = meta_str(&object, "name").unwrap_or_default().to_string();
        let item_path = ResourcePath {
            name: Some(name.clone()),
            ..path.clone()
        };
        if self.find(&item_path).is_some() {
            return Err(failure(
                409,
                "AlreadyExists",
                format!("{} \"{}\" already exists", path.plural, name),
            ));
        }

        self.stamp_new(&mut object);

        if !is_dry_run(request) {
            self.collections
                .entry(path.collection.clone())
                .or_default()
                .push(object.clone());
            self.record(&path.collection, "ADDED", &object);
        }

        Ok(RawResponse::json(201, &object))
    }

    fn replace(&mut self, path: &ResourcePath, request: &ApiRequest) -> Result<RawResponse, RawResponse> {
        let mut object = json_object_body(request)?;
        let (index, existing) = self.find(path).ok_or_else(|| not_found(path))?;
        let existing = existing.clone();

        if meta_str(&object, "name").is_some_and(|n| Some(n) != path.name.as_deref()) {
            return Err(failure(
                400,
                "BadRequest",
                "the name of the object does not match the name on the URL",
            ));
        }
        if let Some(rv) = meta_str(&object, "resourceVersion") {
            if Some(rv) != meta_str(&existing, "resourceVersion") {
                return Err(failure(
                    409,
                    "Conflict",
                    format!(
                        "Operation cannot be fulfilled on {} \"{}\": the object has been modified",
                        path.plural,
                        path.name.as_deref().unwrap_or_default()
                    ),
                ));
            }
        }

        if path.subresource.as_deref() == Some("status") {
            let status = object.get("status").cloned().unwrap_or(Value::Null);
            object = existing.clone();
            object["status"] = status;
        }

        self.commit_update(path, index, &existing, object, request)
    }

    fn patch(&mut self, path: &ResourcePath, request: &ApiRequest) -> Result<RawResponse, RawResponse> {
        let patch = match &request.body {
            Some(RequestBody::Json(value)) => value.clone(),
            _ => return Err(failure(400, "BadRequest", "patch body is required")),
        };
        let content_type = request
            .header("Content-Type")
            .unwrap_or("application/merge-patch+json");

        let found = self.find(path).map(|(index, obj)| (index, obj.clone()));
        let Some((index, existing)) = found else {
            if content_type.starts_with("application/apply-patch") {
                let create_path = ResourcePath {
                    name: None,
                    subresource: None,
                    ..path.clone()
                };
                let mut object = patch;
                set_meta(
                    &mut object,
                    "name",
                    Value::String(path.name.clone().unwrap_or_default()),
                );
                let mut create = request.clone();
                create.body = Some(RequestBody::Json(object));
                return self.create(&create_path, &create);
            }
            return Err(not_found(path));
        };

        let mut object = existing.clone();
        if content_type.starts_with("application/json-patch") {
            apply_json_patch(&mut object, &patch)?;
        } else {
            merge_patch(&mut object, &patch);
        }

        self.commit_update(path, index, &existing, object, request)
    }

    fn delete(&mut self, path: &ResourcePath, request: &ApiRequest) -> Result<RawResponse, RawResponse> {
        let (index, object) = self.find(path).ok_or_else(|| not_found(path))?;
        let object = object.clone();

        if !is_dry_run(request) {
            if let Some(items) = self.collections.get_mut(&path.collection) {
                items.remove(index);
            }
            self.revision += 1;
            self.record(&path.collection, "DELETED", &object);
        }

        Ok(RawResponse::json(200, &object))
    }

    fn delete_collection(
        &mut self,
        path: &ResourcePath,
        request: &ApiRequest,
    ) -> Result<RawResponse, RawResponse> {
        let doomed = self.select(path, request)?;

        if !is_dry_run(request) && !doomed.is_empty() {
            let keys: Vec<_> = doomed.iter().map(object_key).collect();
            if let Some(items) = self.collections.get_mut(&path.collection) {
                items.retain(|item| !keys.contains(&object_key(item)));
            }
            self.revision += 1;
            for object in &doomed {
                self.record(&path.collection, "DELETED", object);
            }
        }

        Ok(status_response(200, &StatusBody::success()))
    }

    fn watch(&self, path: &ResourcePath, request: &ApiRequest) -> Result<RawResponse, RawResponse> {
        let last_event = self.events.get(&path.collection).and_then(|events| {
            events
                .iter()
                .rev()
                .find(|event| in_namespace(&event["object"], path.namespace.as_deref()))
                .cloned()
        });

        let event = match last_event {
            Some(event) => event,
            None => match self.select(path, request)?.pop() {
                Some(object) => json!({"type": "ADDED", "object": object}),
                None => json!({
                    "type": "BOOKMARK",
                    "object": {"metadata": {"resourceVersion": self.revision.to_string()}}
                }),
            },
        };

        Ok(RawResponse::json(200, &event))
    }

    // ------------------------------------------------------------------------

    fn commit_update(
        &mut self,
        path: &ResourcePath,
        index: usize,
        existing: &Value,
        mut object: Value,
        request: &ApiRequest,
    ) -> Result<RawResponse, RawResponse> {
        for field in ["name", "namespace", "uid", "creationTimestamp"] {
            match existing["metadata"].get(field) {
                Some(value) => set_meta(&mut object, field, value.clone()),
                None => {
                    if let Some(meta) = object.get_mut("metadata").and_then(Value::as_object_mut) {
                        meta.remove(field);
                    }
                }
            }
        }

        if is_dry_run(request) {
            return Ok(RawResponse::json(200, &object));
        }

        self.revision += 1;
        set_meta(
            &mut object,
            "resourceVersion",
            Value::String(self.revision.to_string()),
        );
        if let Some(items) = self.collections.get_mut(&path.collection) {
            items[index] = object.clone();
        }
        self.record(&path.collection, "MODIFIED", &object);

        Ok(RawResponse::json(200, &object))
    }

    fn stamp_new(&mut self, object: &mut Value) {
        self.revision += 1;
        self.next_uid += 1;
        let uid = format!("00000000-0000-4000-8000-{:012x}", self.next_uid);
        set_meta(object, "uid", Value::String(uid));
        set_meta(
            object,
            "resourceVersion",
            Value::String(self.revision.to_string()),
        );
        set_meta(
            object,
            "creationTimestamp",
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
    }

    fn record(&mut self, collection: &str, kind: &str, object: &Value) {
        self.events
            .entry(collection.to_string())
            .or_default()
            .push(json!({"type": kind, "object": object}));
    }

    fn find(&self, path: &ResourcePath) -> Option<(usize, &Value)> {
        let name = path.name.as_deref()?;
        self.collections.get(&path.collection)?.iter().enumerate().find(|(_, item)| {
            meta_str(item, "name") == Some(name)
                && meta_str(item, "namespace") == path.namespace.as_deref()
        })
    }

    /// Objects in the path's scope that pass the request's selectors
    fn select(&self, path: &ResourcePath, request: &ApiRequest) -> Result<Vec<Value>, RawResponse> {
        let labels = request
            .query_value("labelSelector")
            .map(parse_label_selector)
            .transpose()?
            .unwrap_or_default();
        let fields = request
            .query_value("fieldSelector")
            .map(parse_field_selector)
            .transpose()?
            .unwrap_or_default();

        Ok(self
            .collections
            .get(&path.collection)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| in_namespace(item, path.namespace.as_deref()))
                    .filter(|item| labels.iter().all(|req| req.matches(item)))
                    .filter(|item| {
                        fields
                            .iter()
                            .all(|(field, value)| field_value(item, field) == Some(value.as_str()))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

// ============================================================================
// Selectors
// ============================================================================

enum LabelRequirement {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
    NotExists(String),
}

impl LabelRequirement {
    fn matches(&self, object: &Value) -> bool {
        let label = |key: &str| {
            object["metadata"]["labels"]
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        match self {
            LabelRequirement::Equals(k, v) => label(k).as_deref() == Some(v),
            LabelRequirement::NotEquals(k, v) => label(k).as_deref() != Some(v),
            LabelRequirement::Exists(k) => label(k).is_some(),
            LabelRequirement::NotExists(k) => label(k).is_none(),
        }
    }
}

fn parse_label_selector(selector: &str) -> Result<Vec<LabelRequirement>, RawResponse> {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| {
            let requirement = if let Some((k, v)) = term.split_once("!=") {
                LabelRequirement::NotEquals(k.trim().to_string(), v.trim().to_string())
            } else if let Some((k, v)) = term.split_once("==") {
                LabelRequirement::Equals(k.trim().to_string(), v.trim().to_string())
            } else if let Some((k, v)) = term.split_once('=') {
                LabelRequirement::Equals(k.trim().to_string(), v.trim().to_string())
            } else if let Some(k) = term.strip_prefix('!') {
                LabelRequirement::NotExists(k.trim().to_string())
            } else {
                LabelRequirement::Exists(term.to_string())
            };
            match &requirement {
                LabelRequirement::Equals(k, _)
                | LabelRequirement::NotEquals(k, _)
                | LabelRequirement::Exists(k)
                | LabelRequirement::NotExists(k)
                    if k.is_empty() || k.contains(' ') =>
                {
                    Err(failure(
                        400,
                        "BadRequest",
                        format!("unable to parse requirement: {}", term),
                    ))
                }
                _ => Ok(requirement),
            }
        })
        .collect()
}

fn parse_field_selector(selector: &str) -> Result<Vec<(String, String)>, RawResponse> {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| {
            let (field, value) = term
                .split_once("==")
                .or_else(|| term.split_once('='))
                .ok_or_else(|| {
                    failure(400, "BadRequest", format!("invalid field selector: {}", term))
                })?;
            match field {
                "metadata.name" | "metadata.namespace" => {
                    Ok((field.to_string(), value.to_string()))
                }
                other => Err(failure(
                    400,
                    "BadRequest",
                    format!("field label not supported: {}", other),
                )),
            }
        })
        .collect()
}

fn field_value<'a>(object: &'a Value, field: &str) -> Option<&'a str> {
    match field {
        "metadata.name" => meta_str(object, "name"),
        "metadata.namespace" => meta_str(object, "namespace"),
        _ => None,
    }
}

// ============================================================================
// Patching
// ============================================================================

/// JSON merge patch (RFC 7386)
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// JSON patch (RFC 6902), `add`, `replace`, `remove` and `test` only
fn apply_json_patch(target: &mut Value, patch: &Value) -> Result<(), RawResponse> {
    let invalid = |message: String| failure(422, "Invalid", message);

    let ops = patch
        .as_array()
        .ok_or_else(|| invalid("json patch must be an array".to_string()))?;

    for op in ops {
        let kind = op["op"].as_str().unwrap_or_default();
        let pointer = op["path"].as_str().unwrap_or_default();
        let (parent, last) = pointer
            .rsplit_once('/')
            .ok_or_else(|| invalid(format!("invalid path '{}'", pointer)))?;
        let last = last.replace("~1", "/").replace("~0", "~");

        match kind {
            "test" => {
                if target.pointer(pointer) != Some(&op["value"]) {
                    return Err(invalid(format!("test failed at '{}'", pointer)));
                }
            }
            "replace" => {
                let slot = target
                    .pointer_mut(pointer)
                    .ok_or_else(|| invalid(format!("path '{}' does not exist", pointer)))?;
                *slot = op["value"].clone();
            }
            "add" | "remove" => {
                let container = target
                    .pointer_mut(parent)
                    .ok_or_else(|| invalid(format!("path '{}' does not exist", parent)))?;
                match (kind, container) {
                    ("add", Value::Object(map)) => {
                        map.insert(last, op["value"].clone());
                    }
                    ("add", Value::Array(items)) if last == "-" => {
                        items.push(op["value"].clone());
                    }
                    ("add", Value::Array(items)) => {
                        let index: usize = last
                            .parse()
                            .ok()
                            .filter(|i| *i <= items.len())
                            .ok_or_else(|| invalid(format!("invalid index '{}'", last)))?;
                        items.insert(index, op["value"].clone());
                    }
                    ("remove", Value::Object(map)) => {
                        map.remove(&last)
                            .ok_or_else(|| invalid(format!("path '{}' does not exist", pointer)))?;
                    }
                    ("remove", Value::Array(items)) => {
                        let index: usize = last
                            .parse()
                            .ok()
                            .filter(|i| *i < items.len())
                            .ok_or_else(|| invalid(format!("invalid index '{}'", last)))?;
                        items.remove(index);
                    }
                    _ => return Err(invalid(format!("path '{}' is not a container", parent))),
                }
            }
            other => return Err(invalid(format!("unsupported json patch op '{}'", other))),
        }
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn meta_str<'a>(object: &'a Value, field: &str) -> Option<&'a str> {
    object.get("metadata")?.get(field)?.as_str()
}

fn set_meta(object: &mut Value, field: &str, value: Value) {
    if !object["metadata"].is_object() {
        object["metadata"] = Value::Object(Map::new());
    }
    object["metadata"][field] = value;
}

fn object_key(object: &Value) -> (Option<String>, Option<String>) {
    (
        meta_str(object, "namespace").map(str::to_string),
        meta_str(object, "name").map(str::to_string),
    )
}

fn in_namespace(object: &Value, namespace: Option<&str>) -> bool {
    namespace.is_none_or(|ns| meta_str(object, "namespace") == Some(ns))
}

fn is_dry_run(request: &ApiRequest) -> bool {
    request.query_value("dryRun").is_some()
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    let mut out = lines[start..].join("\n");
    if !out.is_empty() && text.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn json_object_body(request: &ApiRequest) -> Result<Value, RawResponse> {
    match &request.body {
        Some(RequestBody::Json(value)) if value.is_object() => Ok(value.clone()),
        _ => Err(failure(
            400,
            "BadRequest",
            "request body must be a JSON object",
        )),
    }
}

fn status_response(code: u16, status: &StatusBody) -> RawResponse {
    let body = serde_json::to_value(status).unwrap_or(Value::Null);
    RawResponse::json(code, &body)
}

fn failure(code: u16, reason: &str, message: impl Into<String>) -> RawResponse {
    status_response(code, &StatusBody::failure(code, reason, message))
}

fn not_found(path: &ResourcePath) -> RawResponse {
    failure(
        404,
        "NotFound",
        format!(
            "{} \"{}\" not found",
            path.plural,
            path.name.as_deref().unwrap_or_default()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestOptions;

    const CONFIGMAPS: &str = "/api/v1/namespaces/default/configmaps";

    fn config_map(name: &str) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": name, "labels": {"app": name}},
            "data": {"key": "value"}
        })
    }

    #[test]
    fn test_parse_paths() {
        let path = parse_path("/apis/apps/v1/namespaces/web/daemonsets/nginx/status").unwrap();
        assert_eq!(path.collection, "/apis/apps/v1/daemonsets");
        assert_eq!(path.namespace.as_deref(), Some("web"));
        assert_eq!(path.name.as_deref(), Some("nginx"));
        assert_eq!(path.subresource.as_deref(), Some("status"));

        let path = parse_path("/api/v1/namespaces/kube-system").unwrap();
        assert_eq!(path.collection, "/api/v1/namespaces");
        assert_eq!(path.namespace, None);
        assert_eq!(path.name.as_deref(), Some("kube-system"));

        let path = parse_path("/api/v1/namespaces/kube-system/status").unwrap();
        assert_eq!(path.collection, "/api/v1/namespaces");
        assert_eq!(path.subresource.as_deref(), Some("status"));

        let path = parse_path("/api/v1/configmaps").unwrap();
        assert_eq!(path.namespace, None);
        assert_eq!(path.name, None);

        assert_eq!(parse_path("/ops/operators"), None);
    }

    #[tokio::test]
    async fn test_create_assigns_metadata_and_rejects_duplicates() {
        let server = FakeApiServer::new();
        let client = server.client();

        let created: Value = client
            .post(CONFIGMAPS, &(), &config_map("app-config"), &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(created["metadata"]["namespace"], "default");
        assert!(created["metadata"]["uid"].is_string());
        assert!(created["metadata"]["resourceVersion"].is_string());
        assert!(created["metadata"]["creationTimestamp"].is_string());

        let err = client
            .post::<Value, _, _>(CONFIGMAPS, &(), &config_map("app-config"), &RequestOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert_eq!(err.reason(), Some("AlreadyExists"));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_store() {
        let server = FakeApiServer::new();
        let client = server.client();

        let _: Value = client
            .post(
                CONFIGMAPS,
                &json!({"dryRun": "All"}),
                &config_map("ghost"),
                &RequestOptions::new(),
            )
            .await
            .unwrap();
        assert!(server.objects(CONFIGMAPS).is_empty());
    }

    #[tokio::test]
    async fn test_list_scopes_and_selectors() {
        let server = FakeApiServer::new();
        server.seed(CONFIGMAPS, config_map("a"));
        server.seed(CONFIGMAPS, config_map("b"));
        server.seed("/api/v1/namespaces/other/configmaps", config_map("c"));
        let client = server.client();

        let list: Value = client.get(CONFIGMAPS, &(), &RequestOptions::new()).await.unwrap();
        assert_eq!(list["items"].as_array().unwrap().len(), 2);
        assert_eq!(list["items"][0]["metadata"]["name"], "a");

        let all: Value = client
            .get("/api/v1/configmaps", &(), &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(all["items"].as_array().unwrap().len(), 3);

        let selected: Value = client
            .get(
                "/api/v1/configmaps",
                &json!({"labelSelector": "app=c"}),
                &RequestOptions::new(),
            )
            .await
            .unwrap();
        assert_eq!(selected["items"][0]["metadata"]["name"], "c");
        assert_eq!(selected["items"].as_array().unwrap().len(), 1);

        let page: Value = client
            .get(CONFIGMAPS, &json!({"limit": 1}), &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(page["items"].as_array().unwrap().len(), 1);
        assert_eq!(page["metadata"]["continue"], "1");
    }

    #[tokio::test]
    async fn test_replace_keeps_identity_and_patch_merges() {
        let server = FakeApiServer::new();
        let seeded = server.seed(CONFIGMAPS, config_map("app"));
        let client = server.client();
        let item = format!("{}/app", CONFIGMAPS);

        let mut body = config_map("app");
        body["data"] = json!({"key": "new"});
        let replaced: Value = client.put(&item, &(), &body, &RequestOptions::new()).await.unwrap();
        assert_eq!(replaced["metadata"]["uid"], seeded["metadata"]["uid"]);
        assert_ne!(
            replaced["metadata"]["resourceVersion"],
            seeded["metadata"]["resourceVersion"]
        );

        let patched: Value = client
            .patch(
                &item,
                &(),
                &json!({"data": {"extra": "1", "key": null}}),
                &RequestOptions::new().with_header("Content-Type", "application/merge-patch+json"),
            )
            .await
            .unwrap();
        assert_eq!(patched["data"], json!({"extra": "1"}));

        let patched: Value = client
            .patch(
                &item,
                &(),
                &json!([{"op": "add", "path": "/data/more", "value": "2"}]),
                &RequestOptions::new().with_header("Content-Type", "application/json-patch+json"),
            )
            .await
            .unwrap();
        assert_eq!(patched["data"]["more"], "2");
        assert_eq!(server.object(&item).unwrap()["data"]["more"], "2");
    }

    #[tokio::test]
    async fn test_delete_and_watch_events() {
        let server = FakeApiServer::new();
        server.seed(CONFIGMAPS, config_map("a"));
        server.seed(CONFIGMAPS, config_map("b"));
        let client = server.client();

        let deleted: Value = client
            .delete(&format!("{}/a", CONFIGMAPS), &(), &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(deleted["metadata"]["name"], "a");

        let event: Value = client
            .get(CONFIGMAPS, &json!({"watch": true}), &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(event["type"], "DELETED");

        let status: Value = client.delete(CONFIGMAPS, &(), &RequestOptions::new()).await.unwrap();
        assert_eq!(status["status"], "Success");
        assert!(server.objects(CONFIGMAPS).is_empty());

        let err = client
            .delete::<Value, _>(&format!("{}/a", CONFIGMAPS), &(), &RequestOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_pod_log_tail() {
        let server = FakeApiServer::new();
        server.seed(
            "/api/v1/namespaces/default/pods",
            json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "web"}}),
        );
        server.set_pod_log("default", "web", "one\ntwo\nthree\n");
        let text = server
            .client()
            .get_text(
                "/api/v1/namespaces/default/pods/web/log",
                &json!({"tailLines": 2}),
                &RequestOptions::new(),
            )
            .await
            .unwrap();
        assert_eq!(text, "two\nthree\n");
    }

    #[tokio::test]
    async fn test_faults_routes_and_request_log() {
        let server = FakeApiServer::new();
        server.route(Method::GET, "/ops/health", |_| {
            RawResponse::json(200, &json!({"status": "Healthy"}))
        });
        server.inject(Fault::status(500).on(Method::GET, "/ops").times(1));
        let client = server.client();

        let err = client
            .get::<Value, _>("/ops/health", &(), &RequestOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));

        let health: Value = client
            .get("/ops/health", &(), &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(health["status"], "Healthy");
        assert_eq!(server.request_count(Method::GET, "/ops/health"), 2);

        server.inject(Fault::network());
        let err = client
            .get::<Value, _>(CONFIGMAPS, &(), &RequestOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_transport());

        server.clear_faults();
        server.inject(Fault::timeout());
        let err = client
            .get::<Value, _>(CONFIGMAPS, &(), &RequestOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Timeout(_)));
    }
}
