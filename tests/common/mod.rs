#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use solrdump_rs::config_tree::ConfigNode;
use solrdump_rs::confirm::{ActionSummary, Confirm};
use solrdump_rs::document::{Document, document_id};
use solrdump_rs::transport::{Method, SolrRequest, Transport};
use solrdump_rs::{Result, SolrDumpError};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::Mutex;

pub const BASE_URL: &str = "http://solr.test:8983";

pub struct FakeCollection {
    pub config: String,
    pub docs: Vec<Document>,
    pub shards: usize,
}

type FailRule = Box<dyn Fn(&SolrRequest) -> Option<u16> + Send + Sync>;

#[derive(Default)]
struct State {
    collections: BTreeMap<String, FakeCollection>,
    configs: BTreeMap<String, ConfigNode>,
    requests: Vec<SolrRequest>,
    next_version: u64,
    select_skew: usize,
}

/// In-memory Solr cluster speaking just enough of the HTTP API.
pub struct FakeSolr {
    state: Mutex<State>,
    rules: Mutex<Vec<FailRule>>,
}

impl FakeSolr {
    pub fn new() -> Self {
        FakeSolr {
            state: Mutex::new(State {
                next_version: 1_000,
                ..State::default()
            }),
            rules: Mutex::new(Vec::new()),
        }
    }

    pub fn add_config(&self, name: &str, tree: ConfigNode) {
        self.state.lock().unwrap().configs.insert(name.to_string(), tree);
    }

    pub fn add_collection(&self, name: &str, config: &str, docs: Vec<Value>, shards: usize) {
        let mut state = self.state.lock().unwrap();
        let mut stored = Vec::new();
        for doc in docs {
            let mut doc = doc.as_object().unwrap().clone();
            state.next_version += 1;
            doc.insert("_version_".into(), json!(state.next_version));
            stored.push(doc);
        }
        state.collections.insert(
            name.to_string(),
            FakeCollection {
                config: config.to_string(),
                docs: stored,
                shards,
            },
        );
    }

    /// Fail every request for which `rule` returns a status code.
    pub fn fail_when(&self, rule: impl Fn(&SolrRequest) -> Option<u16> + Send + Sync + 'static) {
        self.rules.lock().unwrap().push(Box::new(rule));
    }

    /// Serve every `/select` page after the first `back` rows early, as if
    /// documents had been inserted ahead of the cursor. Served copies carry
    /// the requested `start` in a `window` field.
    pub fn skew_select(&self, back: usize) {
        self.state.lock().unwrap().select_skew = back;
    }

    pub fn clear_failures(&self) {
        self.rules.lock().unwrap().clear();
    }

    pub fn docs(&self, collection: &str) -> Option<Vec<Document>> {
        let state = self.state.lock().unwrap();
        state.collections.get(collection).map(|c| c.docs.clone())
    }

    pub fn doc_ids(&self, collection: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .docs(collection)
            .unwrap_or_default()
            .iter()
            .filter_map(|d| document_id(d, "id"))
            .collect();
        ids.sort();
        ids
    }

    pub fn collection_config(&self, collection: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.collections.get(collection).map(|c| c.config.clone())
    }

    pub fn collection_shards(&self, collection: &str) -> Option<usize> {
        let state = self.state.lock().unwrap();
        state.collections.get(collection).map(|c| c.shards)
    }

    pub fn config(&self, name: &str) -> Option<ConfigNode> {
        self.state.lock().unwrap().configs.get(name).cloned()
    }

    pub fn config_names(&self) -> Vec<String> {
        self.state.lock().unwrap().configs.keys().cloned().collect()
    }

    pub fn requests(&self) -> Vec<SolrRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, suffix: &str) -> Vec<SolrRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.ends_with(suffix))
            .collect()
    }

    pub fn admin_actions(&self) -> Vec<String> {
        self.requests_to("/solr/admin/collections")
            .iter()
            .filter_map(|r| r.param_value("action").map(str::to_string))
            .collect()
    }

    fn error(&self, request: &SolrRequest, status: u16, body: &str) -> SolrDumpError {
        let url = format!("{}{}", BASE_URL, request.path);
        if status == 401 {
            return SolrDumpError::Auth { url };
        }
        SolrDumpError::Transport {
            method: request.method,
            url,
            status: Some(status),
            body: body.to_string(),
        }
    }

    fn route(&self, request: &SolrRequest) -> std::result::Result<Vec<u8>, (u16, String)> {
        let mut state = self.state.lock().unwrap();
        let path = request.path.as_str();

        if path == "/solr/admin/collections" {
            return collections_api(&mut state, request);
        }
        if path == "/solr/admin/configs" {
            return upload_config(&mut state, request);
        }
        if let Some(name) = path.strip_prefix("/api/cluster/configs/") {
            if request.method != Method::Delete {
                return Err((405, "method not allowed".into()));
            }
            return match state.configs.remove(name) {
                Some(_) => Ok(br#"{}"#.to_vec()),
                None => Err((404, format!("config {} not found", name))),
            };
        }

        let rest = path
            .strip_prefix("/solr/")
            .ok_or((404, format!("no handler for {}", path)))?;
        let (collection, handler) = rest
            .split_once('/')
            .ok_or((404, format!("no handler for {}", path)))?;
        if !state.collections.contains_key(collection) {
            return Err((404, format!("collection {} not found", collection)));
        }

        match handler {
            "export" => export_ids(&state, collection, request),
            "select" => select(&state, collection, request),
            "update" => update(&mut state, collection, request),
            "admin/file" => admin_file(&state, collection, request),
            _ => Err((404, format!("no handler for {}", path))),
        }
    }
}

#[async_trait]
impl Transport for FakeSolr {
    async fn send(&self, request: SolrRequest) -> Result<Vec<u8>> {
        self.state.lock().unwrap().requests.push(request.clone());

        let injected = self.rules.lock().unwrap().iter().find_map(|rule| rule(&request));
        if let Some(status) = injected {
            return Err(self.error(&request, status, "injected failure"));
        }

        self.route(&request)
            .map_err(|(status, body)| self.error(&request, status, &body))
    }

    fn base_url(&self) -> &str {
        BASE_URL
    }
}

fn to_body(value: Value) -> std::result::Result<Vec<u8>, (u16, String)> {
    Ok(serde_json::to_vec(&value).unwrap())
}

fn matches_query(doc: &Document, query: &str) -> bool {
    if query == "*:*" {
        return true;
    }
    match query.split_once(':') {
        Some((field, value)) => doc
            .get(field)
            .map(|v| match v {
                Value::String(s) => s == value,
                other => other.to_string() == value,
            })
            .unwrap_or(false),
        None => false,
    }
}

fn sorted_matches<'a>(state: &'a State, collection: &str, request: &SolrRequest) -> Vec<&'a Document> {
    let query = request.param_value("q").unwrap_or("*:*");
    let mut docs: Vec<&Document> = state.collections[collection]
        .docs
        .iter()
        .filter(|d| matches_query(d, query))
        .collect();
    if let Some(sort) = request.param_value("sort") {
        let field = sort.split_whitespace().next().unwrap_or("id");
        docs.sort_by_key(|d| std::cmp::Reverse(document_id(d, field)));
    }
    docs
}

fn export_ids(state: &State, collection: &str, request: &SolrRequest) -> std::result::Result<Vec<u8>, (u16, String)> {
    let field = request.param_value("fl").ok_or((400, "fl is required".to_string()))?;
    if request.param_value("sort").is_none() {
        return Err((400, "sort is required".into()));
    }
    let docs: Vec<Value> = sorted_matches(state, collection, request)
        .into_iter()
        .map(|d| json!({ field: d.get(field).cloned().unwrap_or(Value::Null) }))
        .collect();
    to_body(json!({"responseHeader": {"status": 0}, "response": {"numFound": docs.len(), "docs": docs}}))
}

fn select(state: &State, collection: &str, request: &SolrRequest) -> std::result::Result<Vec<u8>, (u16, String)> {
    let start: usize = request.param_value("start").unwrap_or("0").parse().unwrap();
    let rows: usize = request.param_value("rows").unwrap_or("10").parse().unwrap();
    let matched = sorted_matches(state, collection, request);
    let skew = state.select_skew;
    let offset = if start > 0 { start.saturating_sub(skew) } else { 0 };
    let docs: Vec<Document> = matched
        .iter()
        .skip(offset)
        .take(rows)
        .map(|d| {
            let mut doc = (*d).clone();
            if skew > 0 {
                doc.insert("window".into(), json!(start));
            }
            doc
        })
        .collect();
    to_body(json!({
        "responseHeader": {"status": 0},
        "response": {"numFound": matched.len(), "start": start, "docs": docs}
    }))
}

fn contains_key(value: &Value, key: &str) -> bool {
    match value {
        Value::Object(map) => map.contains_key(key) || map.values().any(|v| contains_key(v, key)),
        Value::Array(items) => items.iter().any(|v| contains_key(v, key)),
        _ => false,
    }
}

fn update(state: &mut State, collection: &str, request: &SolrRequest) -> std::result::Result<Vec<u8>, (u16, String)> {
    if request.param_value("commitWithin").is_none() {
        return Err((400, "commitWithin expected".into()));
    }
    let payload = request.payload.as_ref().ok_or((400, "missing body".to_string()))?;
    let docs: Vec<Document> =
        serde_json::from_slice(payload.bytes()).map_err(|e| (400, e.to_string()))?;

    for doc in &docs {
        if doc.contains_key("_version_") {
            return Err((409, "version conflict".into()));
        }
        if contains_key(&Value::Object(doc.clone()), "_root_") {
            return Err((400, "_root_ must not be set".into()));
        }
    }

    for mut doc in docs {
        state.next_version += 1;
        doc.insert("_version_".into(), json!(state.next_version));
        let id = document_id(&doc, "id");
        let stored = &mut state.collections.get_mut(collection).unwrap().docs;
        match stored.iter_mut().find(|d| document_id(d, "id") == id) {
            Some(existing) => *existing = doc,
            None => stored.push(doc),
        }
    }
    to_body(json!({"responseHeader": {"status": 0}}))
}

fn node_at<'a>(root: &'a ConfigNode, path: &str) -> Option<&'a ConfigNode> {
    let mut current = root;
    for part in path.split('/').filter(|p| !p.is_empty()) {
        match current {
            ConfigNode::Directory(children) => current = children.get(part)?,
            ConfigNode::File(_) => return None,
        }
    }
    Some(current)
}

fn admin_file(state: &State, collection: &str, request: &SolrRequest) -> std::result::Result<Vec<u8>, (u16, String)> {
    let config_name = &state.collections[collection].config;
    let root = state
        .configs
        .get(config_name)
        .ok_or((404, format!("config {} missing", config_name)))?;
    let path = request.param_value("file").unwrap_or("");
    let node = node_at(root, path).ok_or((404, format!("no such file {}", path)))?;

    match node {
        ConfigNode::File(content) => Ok(content.clone()),
        ConfigNode::Directory(children) => {
            let files: serde_json::Map<String, Value> = children
                .iter()
                .map(|(name, child)| {
                    let entry = match child {
                        ConfigNode::File(c) => json!({"size": c.len(), "modified": "2024-01-01T00:00:00Z"}),
                        ConfigNode::Directory(_) => json!({"directory": true, "modified": "2024-01-01T00:00:00Z"}),
                    };
                    (name.clone(), entry)
                })
                .collect();
            to_body(json!({"responseHeader": {"status": 0, "QTime": 1}, "files": files}))
        }
    }
}

fn upload_config(state: &mut State, request: &SolrRequest) -> std::result::Result<Vec<u8>, (u16, String)> {
    if request.param_value("action") != Some("UPLOAD") {
        return Err((400, "unsupported action".into()));
    }
    let name = request.param_value("name").ok_or((400, "name required".to_string()))?;
    let overwrite = request.param_value("overwrite") == Some("true");
    if state.configs.contains_key(name) && !overwrite {
        return Err((400, format!("config {} already exists", name)));
    }

    let payload = request.payload.as_ref().ok_or((400, "missing body".to_string()))?;
    let mut archive =
        zip::ZipArchive::new(Cursor::new(payload.bytes().to_vec())).map_err(|e| (400, e.to_string()))?;
    let mut tree = ConfigNode::empty_dir();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| (400, e.to_string()))?;
        let entry_name = file.name().to_string();
        if file.is_dir() {
            tree.insert_path(&entry_name, ConfigNode::empty_dir());
        } else {
            let mut content = Vec::new();
            file.read_to_end(&mut content).map_err(|e| (400, e.to_string()))?;
            tree.insert_path(&entry_name, ConfigNode::File(content));
        }
    }
    state.configs.insert(name.to_string(), tree);
    to_body(json!({"responseHeader": {"status": 0}}))
}

fn collections_api(state: &mut State, request: &SolrRequest) -> std::result::Result<Vec<u8>, (u16, String)> {
    match request.param_value("action") {
        Some("CLUSTERSTATUS") => {
            let collections: serde_json::Map<String, Value> = state
                .collections
                .iter()
                .map(|(name, c)| {
                    let shards: serde_json::Map<String, Value> = (1..=c.shards)
                        .map(|i| (format!("shard{}", i), json!({"state": "active", "replicas": {}})))
                        .collect();
                    (
                        name.clone(),
                        json!({"configName": c.config, "shards": shards, "router": {"name": "compositeId"}}),
                    )
                })
                .collect();
            to_body(json!({
                "responseHeader": {"status": 0, "QTime": 2},
                "cluster": {"collections": collections, "aliases": {}, "live_nodes": ["127.0.0.1:8983_solr"]}
            }))
        }
        Some("DELETE") => {
            let name = request.param_value("name").ok_or((400, "name required".to_string()))?;
            match state.collections.remove(name) {
                Some(_) => to_body(json!({"success": {}})),
                None => Err((400, format!("Could not find collection : {}", name))),
            }
        }
        Some("CREATE") => {
            let name = request.param_value("name").ok_or((400, "name required".to_string()))?;
            let config = request
                .param_value("collection.configName")
                .ok_or((400, "configName required".to_string()))?;
            let shards: usize = request.param_value("numShards").unwrap_or("1").parse().unwrap();
            if state.collections.contains_key(name) {
                return Err((400, format!("collection already exists: {}", name)));
            }
            if !state.configs.contains_key(config) {
                return Err((400, format!("Can not find the specified config set: {}", config)));
            }
            state.collections.insert(
                name.to_string(),
                FakeCollection {
                    config: config.to_string(),
                    docs: Vec::new(),
                    shards,
                },
            );
            to_body(json!({"success": {}}))
        }
        other => Err((400, format!("unsupported action {:?}", other))),
    }
}

/// Answers every prompt with a fixed value and remembers what was asked
pub struct ScriptedConfirm {
    answer: bool,
    pub asked: Mutex<Vec<ActionSummary>>,
}

impl ScriptedConfirm {
    pub fn yes() -> Self {
        ScriptedConfirm {
            answer: true,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn no() -> Self {
        ScriptedConfirm {
            answer: false,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> usize {
        self.asked.lock().unwrap().len()
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&self, summary: &ActionSummary) -> std::io::Result<bool> {
        self.asked.lock().unwrap().push(summary.clone());
        Ok(self.answer)
    }
}

pub fn sample_config() -> ConfigNode {
    let mut root = ConfigNode::empty_dir();
    root.insert_path("solrconfig.xml", ConfigNode::File(b"<config><luceneMatchVersion>9.4</luceneMatchVersion></config>".to_vec()));
    root.insert_path("managed-schema.xml", ConfigNode::File(b"<schema name=\"books\"/>".to_vec()));
    root.insert_path("stopwords.txt", ConfigNode::File(b"# root stopwords\n".to_vec()));
    root.insert_path("lang/stopwords.txt", ConfigNode::File(b"# english\nthe\na\n".to_vec()));
    root.insert_path("lang/de/stopwords.txt", ConfigNode::File(b"# german\nder\ndie\n".to_vec()));
    root.insert_path("synonyms.txt", ConfigNode::File(vec![0xEF, 0xBB, 0xBF, b'a', b',', b'b', b'\n']));
    root
}

pub fn book(id: u32, kind: &str) -> Value {
    json!({
        "id": id.to_string(),
        "type": kind,
        "title": format!("Book {}", id),
        "summary": lipsum::lipsum(12),
    })
}
