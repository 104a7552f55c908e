//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```
//!
//! [`StubOcl`] is a small axum server that imitates the parts of the OCL API ocl-sync talks
//! to: one source with versions and concepts, and one collection.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Value};
use std::{
    collections::{BTreeSet, HashMap},
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tempfile::TempDir;

pub const TOKEN: &str = "test-token";
pub const SOURCE: &str = "/orgs/CIEL/sources/CIEL/";
pub const RELEASED: &str = "/orgs/CIEL/sources/CIEL/v2/";
pub const COLLECTION: &str = "/users/tester/collections/closure/";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
pub struct StubState {
    /// Path the API is mounted under, e.g. `/ocl-api`
    pub prefix: String,
    pub concepts: Mutex<HashMap<String, Value>>,
    pub references: Mutex<BTreeSet<String>>,
    pub requests: Mutex<Vec<RecordedRequest>>,
}

impl StubState {
    #[allow(dead_code)]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn writes(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::PUT || r.method == Method::DELETE)
            .collect()
    }

    #[allow(dead_code)]
    pub fn references(&self) -> BTreeSet<String> {
        self.references.lock().unwrap().clone()
    }
}

pub struct StubOcl {
    pub url: String,
    pub state: Arc<StubState>,
}

/// Concept JSON as served by the stub, with one same-source mapping per `related` id.
pub fn concept_json(id: &str, related: &[&str]) -> Value {
    let mappings: Vec<Value> = related
        .iter()
        .map(|to| {
            json!({
                "url": format!("{SOURCE}mappings/{id}-{to}/"),
                "map_type": "Q-AND-A",
                "from_concept_url": format!("{SOURCE}concepts/{id}/"),
                "to_source_url": SOURCE,
                "to_concept_code": to,
                "to_concept_url": format!("{SOURCE}concepts/{to}/"),
            })
        })
        .collect();
    json!({
        "id": id,
        "display_name": format!("Concept {id}"),
        "version_url": format!("{RELEASED}concepts/{id}/"),
        "mappings": mappings,
    })
}

impl StubOcl {
    /// Start the stub on an ephemeral local port.
    pub async fn start(concepts: Vec<Value>, references: &[&str]) -> StubOcl {
        Self::start_under("", concepts, references).await
    }

    /// Start the stub with the API mounted under `prefix`; `url` includes the prefix.
    #[allow(dead_code)]
    pub async fn start_under(prefix: &str, concepts: Vec<Value>, references: &[&str]) -> StubOcl {
        let state = Arc::new(StubState {
            prefix: prefix.to_string(),
            ..Default::default()
        });
        {
            let mut stored = state.concepts.lock().unwrap();
            for concept in concepts {
                let id = concept["id"].as_str().unwrap_or_default().to_string();
                stored.insert(id, concept);
            }
            let mut refs = state.references.lock().unwrap();
            refs.extend(references.iter().map(|r| r.to_string()));
        }

        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        StubOcl {
            url: format!("http://{addr}{prefix}"),
            state,
        }
    }

    /// Write a config directory (and seed file) pointing at this stub.
    #[allow(dead_code)]
    pub fn write_config(&self, root: &TempDir, token: &str, seeds: &str) -> PathBuf {
        let dir = root.path().join("config");
        std::fs::create_dir_all(&dir).unwrap();
        let default = format!(
            r#"
server = "{}"
source_path = "{SOURCE}"
collection_path = "{COLLECTION}"
api_token = "{token}"
concept_file = "concepts.txt"
concurrency = 3
"#,
            self.url
        );
        std::fs::write(dir.join("default.toml"), default).unwrap();
        std::fs::write(root.path().join("concepts.txt"), seeds).unwrap();
        dir
    }
}

async fn handle(
    State(state): State<Arc<StubState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body: Option<Value> = serde_json::from_slice(&body).ok();
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        uri: uri.to_string(),
        authorization: authorization.clone(),
        body: body.clone(),
    });

    let expected = format!("Token {TOKEN}");
    if authorization.as_deref() != Some(expected.as_str()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let Some(path) = uri.path().strip_prefix(state.prefix.as_str()) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let collection_refs = format!("{COLLECTION}references");
    let concepts_prefix = format!("{RELEASED}concepts/");

    if path == collection_refs {
        return if method == Method::GET {
            let refs: Vec<Value> = state
                .references()
                .into_iter()
                .map(|r| json!({ "expression": r, "reference_type": "concepts" }))
                .collect();
            Json(Value::Array(refs)).into_response()
        } else if method == Method::PUT {
            let expressions: Vec<String> = body
                .as_ref()
                .and_then(|b| b["data"]["expressions"].as_array().cloned())
                .unwrap_or_default()
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            let mut refs = state.references.lock().unwrap();
            let messages: Vec<Value> = expressions
                .into_iter()
                .map(|e| {
                    refs.insert(e.clone());
                    json!({ "added": true, "expression": e })
                })
                .collect();
            Json(Value::Array(messages)).into_response()
        } else if method == Method::DELETE {
            let removed: Vec<String> = body
                .as_ref()
                .and_then(|b| b["references"].as_array().cloned())
                .unwrap_or_default()
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            let mut refs = state.references.lock().unwrap();
            for r in removed {
                refs.remove(&r);
            }
            StatusCode::NO_CONTENT.into_response()
        } else {
            StatusCode::METHOD_NOT_ALLOWED.into_response()
        };
    }

    if method == Method::GET && path == format!("{SOURCE}versions") {
        return Json(json!([
            { "id": "HEAD", "version_url": SOURCE, "created_on": "2021-03-01T10:00:00.000" },
            { "id": "v1", "version_url": "/orgs/CIEL/sources/CIEL/v1/", "created_on": "2019-01-04T17:09:15.471" },
            { "id": "v2", "version_url": RELEASED, "created_on": "2020-02-11T08:30:00.120" },
        ]))
        .into_response();
    }

    if method == Method::GET {
        if let Some(rest) = path.strip_prefix(&concepts_prefix) {
            if uri.query() != Some("includeMappings=true") {
                return StatusCode::BAD_REQUEST.into_response();
            }
            let id = url::form_urlencoded::parse(rest.trim_end_matches('/').as_bytes())
                .next()
                .map(|(id, _)| id.into_owned())
                .unwrap_or_default();
            return match state.concepts.lock().unwrap().get(&id) {
                Some(concept) => Json(concept.clone()).into_response(),
                None => StatusCode::NOT_FOUND.into_response(),
            };
        }
    }

    StatusCode::NOT_FOUND.into_response()
}
