//! In-memory platform doubles for tests.
//!
//! [`ScriptedTransport`] replays canned responses in order. [`FakeFabric`]
//! behaves like a small platform: it keeps items per workspace, paginates
//! lists, answers KQL database creation (and any kind switched on with
//! [`FakeFabric::with_long_running`]) with a long running operation, stores
//! OneLake files and records every cluster command.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde_json::{json, Value};

use common::config::FabricEndpoints;
use common::errors::{AppError, AppResult};

use crate::transport::{PlatformRequest, PlatformResponse, PlatformTransport, RequestBody};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Replays responses in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<PlatformResponse>>,
    requests: Mutex<Vec<PlatformRequest>>,
}

impl ScriptedTransport {
    pub fn with_responses(responses: impl IntoIterator<Item = PlatformResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::default(),
        }
    }

    pub fn requests(&self) -> Vec<PlatformRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl PlatformTransport for ScriptedTransport {
    async fn send(&self, request: PlatformRequest) -> AppResult<PlatformResponse> {
        let url = request.url.clone();
        lock(&self.requests).push(request);
        lock(&self.responses)
            .pop_front()
            .ok_or_else(|| AppError::ExternalService(format!("no scripted response for {url}")))
    }
}

/// A control command or query the fake cluster received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub database: String,
    pub text: String,
}

struct FailRule {
    method: Method,
    fragment: String,
    response: PlatformResponse,
}

struct StoredItem {
    workspace_id: String,
    kind: &'static str,
    value: Value,
}

struct FakeState {
    items: Vec<StoredItem>,
    connections: Vec<Value>,
    files: BTreeMap<String, String>,
    staged: HashMap<String, String>,
    commands: Vec<RecordedCommand>,
    requests: Vec<PlatformRequest>,
    rules: Vec<FailRule>,
    page_size: usize,
    polygon_key: Option<String>,
    long_running: HashSet<String>,
    next_id: u64,
}

/// In-memory stand-in for the platform REST API, OneLake, the analytical
/// cluster and Polygon.io.
pub struct FakeFabric {
    endpoints: FabricEndpoints,
    state: Mutex<FakeState>,
}

impl Default for FakeFabric {
    fn default() -> Self {
        Self::new(FabricEndpoints::default())
    }
}

impl FakeFabric {
    pub fn new(endpoints: FabricEndpoints) -> Self {
        Self {
            endpoints,
            state: Mutex::new(FakeState {
                items: Vec::new(),
                connections: Vec::new(),
                files: BTreeMap::new(),
                staged: HashMap::new(),
                commands: Vec::new(),
                requests: Vec::new(),
                rules: Vec::new(),
                page_size: 2,
                polygon_key: None,
                long_running: HashSet::from(["KQLDatabase".to_string()]),
                next_id: 0,
            }),
        }
    }

    /// Items per list page; small by default so lists span several pages.
    pub fn with_page_size(self, page_size: usize) -> Self {
        lock(&self.state).page_size = page_size.max(1);
        self
    }

    /// Answers creates of `kind` (`Eventhouse`, `Lakehouse`, `DataPipeline`,
    /// `Connection`, ...) with 202 and an operation location.
    pub fn with_long_running(self, kind: &str) -> Self {
        lock(&self.state).long_running.insert(kind.to_string());
        self
    }

    pub fn with_polygon_key(self, key: &str) -> Self {
        lock(&self.state).polygon_key = Some(key.to_string());
        self
    }

    /// Answers `response` to every `method` request whose URL or body contains `fragment`.
    pub fn fail_when(&self, method: Method, fragment: &str, response: PlatformResponse) {
        lock(&self.state).rules.push(FailRule {
            method,
            fragment: fragment.to_string(),
            response,
        });
    }

    pub fn seed_lakehouse(&self, workspace_id: &str, display_name: &str) -> String {
        self.seed(workspace_id, "Lakehouse", display_name, json!({}))
    }

    pub fn seed_eventhouse(&self, workspace_id: &str, display_name: &str) -> String {
        let uri = format!("https://{}.kusto.fake", display_name.to_lowercase());
        self.seed(
            workspace_id,
            "Eventhouse",
            display_name,
            json!({"properties": {"queryServiceUri": uri, "databasesItemIds": []}}),
        )
    }

    pub fn seed_kql_database(&self, workspace_id: &str, eventhouse_id: &str, display_name: &str) -> String {
        let uri = self.cluster_uri_of(workspace_id, eventhouse_id);
        self.seed(
            workspace_id,
            "KQLDatabase",
            display_name,
            json!({"properties": {
                "parentEventhouseItemId": eventhouse_id,
                "queryServiceUri": uri,
                "databaseType": "ReadWrite"
            }}),
        )
    }

    pub fn seed_connection(&self, display_name: &str) -> String {
        let mut state = lock(&self.state);
        let id = next_id(&mut state);
        state
            .connections
            .push(json!({"id": id, "displayName": display_name}));
        id
    }

    pub fn seed_file(&self, path: &str, content: &str) {
        lock(&self.state)
            .files
            .insert(path.to_string(), content.to_string());
    }

    /// Items of a kind (`Eventhouse`, `KQLDatabase`, `Lakehouse`, `DataPipeline`) in a workspace.
    pub fn items(&self, workspace_id: &str, kind: &str) -> Vec<Value> {
        lock(&self.state)
            .items
            .iter()
            .filter(|item| item.workspace_id == workspace_id && item.kind == kind)
            .map(|item| item.value.clone())
            .collect()
    }

    pub fn connections(&self) -> Vec<Value> {
        lock(&self.state).connections.clone()
    }

    pub fn file(&self, path: &str) -> Option<String> {
        lock(&self.state).files.get(path).cloned()
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        lock(&self.state).commands.clone()
    }

    pub fn requests(&self) -> Vec<PlatformRequest> {
        lock(&self.state).requests.clone()
    }

    fn seed(&self, workspace_id: &str, kind: &'static str, display_name: &str, extra: Value) -> String {
        let mut state = lock(&self.state);
        let id = next_id(&mut state);
        let mut value = json!({
            "id": id,
            "displayName": display_name,
            "type": kind,
            "workspaceId": workspace_id,
        });
        merge(&mut value, extra);
        state.items.push(StoredItem {
            workspace_id: workspace_id.to_string(),
            kind,
            value,
        });
        id
    }

    fn cluster_uri_of(&self, workspace_id: &str, eventhouse_id: &str) -> String {
        lock(&self.state)
            .items
            .iter()
            .find(|i| i.workspace_id == workspace_id && i.value["id"] == eventhouse_id)
            .and_then(|i| i.value["properties"]["queryServiceUri"].as_str().map(str::to_string))
            .unwrap_or_else(|| "https://cluster.kusto.fake".to_string())
    }

    fn route(&self, request: &PlatformRequest) -> AppResult<PlatformResponse> {
        let url = Url::parse(&request.url)
            .map_err(|e| AppError::ExternalService(format!("bad url {}: {e}", request.url)))?;

        if request.url.starts_with(&self.endpoints.polygon_validation_url) {
            return Ok(self.polygon(request));
        }
        if url.path().starts_with("/v1/rest/") {
            return Ok(self.cluster(request));
        }
        if url.host_str() == Some(self.endpoints.onelake_host()) {
            return Ok(self.onelake(request, &url));
        }
        Ok(self.platform_api(request, &url))
    }

    fn polygon(&self, request: &PlatformRequest) -> PlatformResponse {
        let state = lock(&self.state);
        match (&state.polygon_key, &request.token) {
            (Some(key), Some(token)) if key == token => {
                PlatformResponse::new(200, r#"{"status":"OK","resultsCount":1}"#)
            }
            _ => PlatformResponse::new(401, r#"{"status":"ERROR","error":"Unknown API Key"}"#),
        }
    }

    fn cluster(&self, request: &PlatformRequest) -> PlatformResponse {
        let RequestBody::Json(body) = &request.body else {
            return PlatformResponse::new(400, "expected JSON body");
        };
        let database = body["db"].as_str().unwrap_or_default().to_string();
        let text = body["csl"].as_str().unwrap_or_default().to_string();
        let mut state = lock(&self.state);
        state.commands.push(RecordedCommand {
            database,
            text: text.clone(),
        });

        let table = if text.trim_start().starts_with(".show tables") {
            let rows: Vec<Value> = ingested_tables(&state.commands)
                .into_iter()
                .map(|t| json!([t, 0]))
                .collect();
            json!({
                "TableName": "Table_0",
                "Columns": [
                    {"ColumnName": "TableName", "DataType": "String", "ColumnType": "string"},
                    {"ColumnName": "Rows", "DataType": "Int64", "ColumnType": "long"}
                ],
                "Rows": rows
            })
        } else {
            json!({"TableName": "Table_0", "Columns": [], "Rows": []})
        };
        PlatformResponse::new(200, json!({ "Tables": [table] }).to_string())
    }

    fn onelake(&self, request: &PlatformRequest, url: &Url) -> PlatformResponse {
        let path = url.path().trim_start_matches('/').to_string();
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let mut state = lock(&self.state);

        match request.method.as_str() {
            "HEAD" if state.files.contains_key(&path) => PlatformResponse::new(200, ""),
            "GET" => match state.files.get(&path) {
                Some(content) => PlatformResponse::new(200, content.clone()),
                None => PlatformResponse::new(404, ""),
            },
            "PUT" if query.get("resource").map(String::as_str) == Some("file") => {
                state.staged.insert(path, String::new());
                PlatformResponse::new(201, "")
            }
            "PATCH" => match query.get("action").map(String::as_str) {
                Some("append") => match &request.body {
                    RequestBody::Text { content, .. } => {
                        state.staged.insert(path, content.clone());
                        PlatformResponse::new(202, "")
                    }
                    _ => PlatformResponse::new(400, ""),
                },
                Some("flush") => match state.staged.remove(&path) {
                    Some(content) => {
                        state.files.insert(path, content);
                        PlatformResponse::new(200, "")
                    }
                    None => PlatformResponse::new(404, ""),
                },
                _ => PlatformResponse::new(400, ""),
            },
            "DELETE" if state.files.remove(&path).is_some() => PlatformResponse::new(200, ""),
            _ => PlatformResponse::new(404, ""),
        }
    }

    fn platform_api(&self, request: &PlatformRequest, url: &Url) -> PlatformResponse {
        let segments: Vec<&str> = url
            .path()
            .trim_start_matches("/v1/")
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let method = request.method.as_str();

        match (method, segments.as_slice()) {
            ("GET", ["operations", _]) => {
                PlatformResponse::new(200, r#"{"status":"Succeeded","percentComplete":100}"#)
            }
            ("GET", ["connections"]) => {
                let connections = lock(&self.state).connections.clone();
                self.page(url, connections)
            }
            ("POST", ["connections"]) => self.create_connection(request),
            ("GET", ["workspaces", ws, "lakehouses", id]) => {
                match self.items(ws, "Lakehouse").into_iter().find(|i| i["id"] == *id) {
                    Some(item) => PlatformResponse::new(200, item.to_string()),
                    None => not_found("ItemNotFound", "The requested item was not found"),
                }
            }
            ("GET", ["workspaces", ws, collection]) => match collection_kind(collection) {
                Some(kind) => self.page(url, self.items(ws, kind)),
                None => not_found("EntityNotFound", "unknown collection"),
            },
            ("POST", ["workspaces", ws, "items"]) => {
                let body = json_body(request);
                match body["type"].as_str() {
                    Some("DataPipeline") => self.create_item(ws, "DataPipeline", body),
                    _ => bad_request("InvalidItemType", "unsupported item type"),
                }
            }
            ("POST", ["workspaces", ws, collection]) => match collection_kind(collection) {
                Some(kind) => self.create_item(ws, kind, json_body(request)),
                None => not_found("EntityNotFound", "unknown collection"),
            },
            _ => not_found("EntityNotFound", "no such endpoint"),
        }
    }

    fn page(&self, url: &Url, all: Vec<Value>) -> PlatformResponse {
        let page_size = lock(&self.state).page_size;
        let offset: usize = url
            .query_pairs()
            .find(|(k, _)| k == "continuationToken")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);
        let value: Vec<Value> = all.iter().skip(offset).take(page_size).cloned().collect();
        let next = offset + value.len();

        let mut body = json!({ "value": value });
        if next < all.len() {
            let mut next_url = url.clone();
            next_url.set_query(Some(&format!("continuationToken={next}")));
            body["continuationToken"] = json!(next.to_string());
            body["continuationUri"] = json!(next_url.to_string());
        }
        PlatformResponse::new(200, body.to_string())
    }

    fn is_long_running(&self, kind: &str) -> bool {
        lock(&self.state).long_running.contains(kind)
    }

    fn accepted(&self, id: &str) -> PlatformResponse {
        PlatformResponse::new(202, "")
            .with_header("Location", self.endpoints.api_url(&format!("operations/{id}")))
            .with_header("Retry-After", "1")
    }

    fn create_item(&self, ws: &str, kind: &'static str, body: Value) -> PlatformResponse {
        let Some(name) = body["displayName"].as_str().map(str::to_string) else {
            return bad_request("InvalidInput", "displayName is required");
        };
        if self.items(ws, kind).iter().any(|i| i["displayName"] == name.as_str()) {
            return PlatformResponse::new(
                409,
                json!({
                    "errorCode": "ItemDisplayNameAlreadyInUse",
                    "message": format!("Requested '{name}' is already in use")
                })
                .to_string(),
            );
        }

        let mut extra = json!({ "description": body["description"].clone() });
        match kind {
            "Eventhouse" => {
                extra["properties"] = json!({
                    "queryServiceUri": format!("https://{}.kusto.fake", name.to_lowercase()),
                    "databasesItemIds": []
                });
            }
            "KQLDatabase" => {
                let parent = body["creationPayload"]["parentEventhouseItemId"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                extra["properties"] = json!({
                    "parentEventhouseItemId": parent,
                    "queryServiceUri": self.cluster_uri_of(ws, &parent),
                    "databaseType": body["creationPayload"]["databaseType"].clone()
                });
            }
            "DataPipeline" => extra["definition"] = body["definition"].clone(),
            _ => {}
        }
        let id = self.seed(ws, kind, &name, extra);

        if self.is_long_running(kind) {
            self.accepted(&id)
        } else {
            let created = self
                .items(ws, kind)
                .into_iter()
                .find(|i| i["id"] == id.as_str())
                .unwrap_or_default();
            PlatformResponse::new(201, created.to_string())
        }
    }

    fn create_connection(&self, request: &PlatformRequest) -> PlatformResponse {
        let mut body = json_body(request);
        let Some(name) = body["displayName"].as_str().map(str::to_string) else {
            return bad_request("InvalidInput", "displayName is required");
        };
        let mut state = lock(&self.state);
        if state.connections.iter().any(|c| c["displayName"] == name.as_str()) {
            return PlatformResponse::new(
                409,
                json!({"errorCode": "DuplicateConnectionName", "message": "name in use"}).to_string(),
            );
        }
        let id = next_id(&mut state);
        body["id"] = json!(id);
        state.connections.push(body.clone());
        let long_running = state.long_running.contains("Connection");
        drop(state);
        if long_running {
            return self.accepted(&id);
        }
        PlatformResponse::new(201, body.to_string())
    }
}

#[async_trait]
impl PlatformTransport for FakeFabric {
    async fn send(&self, request: PlatformRequest) -> AppResult<PlatformResponse> {
        lock(&self.state).requests.push(request.clone());

        let body_text = match &request.body {
            RequestBody::Json(value) => value.to_string(),
            RequestBody::Text { content, .. } => content.clone(),
            RequestBody::Empty => String::new(),
        };
        let failure = lock(&self.state)
            .rules
            .iter()
            .find(|rule| {
                rule.method == request.method
                    && (request.url.contains(&rule.fragment) || body_text.contains(&rule.fragment))
            })
            .map(|rule| rule.response.clone());
        if let Some(response) = failure {
            return Ok(response);
        }

        self.route(&request)
    }
}

fn next_id(state: &mut FakeState) -> String {
    state.next_id += 1;
    format!("00000000-0000-0000-0000-{:012}", state.next_id)
}

fn merge(target: &mut Value, extra: Value) {
    if let (Some(target), Value::Object(extra)) = (target.as_object_mut(), extra) {
        target.extend(extra.into_iter().filter(|(_, v)| !v.is_null()));
    }
}

fn collection_kind(collection: &str) -> Option<&'static str> {
    match collection {
        "eventhouses" => Some("Eventhouse"),
        "kqlDatabases" => Some("KQLDatabase"),
        "lakehouses" => Some("Lakehouse"),
        "dataPipelines" => Some("DataPipeline"),
        _ => None,
    }
}

fn json_body(request: &PlatformRequest) -> Value {
    match &request.body {
        RequestBody::Json(value) => value.clone(),
        RequestBody::Text { content, .. } => serde_json::from_str(content).unwrap_or(Value::Null),
        RequestBody::Empty => Value::Null,
    }
}

fn ingested_tables(commands: &[RecordedCommand]) -> Vec<String> {
    let mut tables: Vec<String> = commands
        .iter()
        .filter_map(|c| c.text.strip_prefix(".ingest into table "))
        .filter_map(|rest| rest.split_whitespace().next())
        .map(str::to_string)
        .collect();
    tables.dedup();
    tables
}

fn not_found(code: &str, message: &str) -> PlatformResponse {
    PlatformResponse::new(404, json!({"errorCode": code, "message": message}).to_string())
}

fn bad_request(code: &str, message: &str) -> PlatformResponse {
    PlatformResponse::new(400, json!({"errorCode": code, "message": message}).to_string())
}
