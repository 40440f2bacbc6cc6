//! Shared mock services for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral localhost port.
async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// A localhost address with nothing listening on it.
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Recorded state of a mock bulk-index store.
#[derive(Default)]
pub struct MockIndex {
    /// `(channel, document)` for every accepted item.
    pub items: Mutex<Vec<(String, Value)>>,
    pub templates: Mutex<Vec<String>>,
    pub bulk_requests: AtomicUsize,
    /// Documents whose `message` equals this are rejected per item.
    pub reject_message: Mutex<Option<String>>,
    /// Status answered to template registration.
    pub template_status: Mutex<u16>,
}

impl MockIndex {
    pub fn channels(&self) -> Vec<String> {
        self.items.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn documents_in(&self, channel: &str) -> Vec<Value> {
        self.items
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, d)| d.clone())
            .collect()
    }
}

async fn register_template(
    State(index): State<Arc<MockIndex>>,
    Path(name): Path<String>,
) -> Response {
    index.templates.lock().unwrap().push(name);
    let status = *index.template_status.lock().unwrap();
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    (status, Json(json!({"acknowledged": status.is_success()}))).into_response()
}

async fn bulk(State(index): State<Arc<MockIndex>>, body: String) -> Json<Value> {
    index.bulk_requests.fetch_add(1, Ordering::SeqCst);
    let reject = index.reject_message.lock().unwrap().clone();

    let lines: Vec<Value> = body
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    let mut errors = false;
    let mut results = Vec::new();
    for pair in lines.chunks(2) {
        let channel = pair[0]["index"]["_index"].as_str().unwrap().to_string();
        let document = pair[1].clone();
        let rejected = reject.as_deref().is_some_and(|m| document["message"] == m);
        if rejected {
            errors = true;
            results.push(json!({"index": {"status": 400, "error": {"type": "mapper_parsing_exception", "reason": "rejected by mock"}}}));
        } else {
            index.items.lock().unwrap().push((channel, document));
            results.push(json!({"index": {"status": 201}}));
        }
    }

    Json(json!({"errors": errors, "items": results}))
}

/// Start a mock bulk-index store answering template and bulk requests.
pub async fn start_mock_index() -> (SocketAddr, Arc<MockIndex>) {
    let index = Arc::new(MockIndex {
        template_status: Mutex::new(200),
        ..MockIndex::default()
    });
    let router = Router::new()
        .route("/_index_template/{name}", put(register_template))
        .route("/_bulk", post(bulk))
        .with_state(index.clone());
    (serve(router).await, index)
}

/// Recorded state of a mock secret store.
pub struct MockVault {
    secrets: HashMap<String, String>,
    token: String,
    pub requests: AtomicUsize,
    addr: Mutex<Option<SocketAddr>>,
}

fn authorised(vault: &MockVault, headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", vault.token))
}

async fn list_secrets(State(vault): State<Arc<MockVault>>, headers: HeaderMap) -> Response {
    vault.requests.fetch_add(1, Ordering::SeqCst);
    if !authorised(&vault, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let addr = vault.addr.lock().unwrap().unwrap();
    let items: Vec<Value> = vault
        .secrets
        .keys()
        .map(|name| json!({"id": format!("http://{addr}/secrets/{name}")}))
        .collect();
    Json(json!({"value": items})).into_response()
}

async fn get_secret(
    State(vault): State<Arc<MockVault>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    vault.requests.fetch_add(1, Ordering::SeqCst);
    if !authorised(&vault, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    // Secret names are case-insensitive, as in hosted vaults.
    let found = vault
        .secrets
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        .map(|(_, v)| v.clone());
    match found {
        Some(value) => Json(json!({"value": value})).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Start a mock secret store requiring `Bearer <token>`.
pub async fn start_mock_vault(token: &str, secrets: &[(&str, &str)]) -> (SocketAddr, Arc<MockVault>) {
    let vault = Arc::new(MockVault {
        secrets: secrets.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        token: token.to_string(),
        requests: AtomicUsize::new(0),
        addr: Mutex::new(None),
    });
    let router = Router::new()
        .route("/secrets", get(list_secrets))
        .route("/secrets/{name}", get(get_secret))
        .with_state(vault.clone());
    let addr = serve(router).await;
    *vault.addr.lock().unwrap() = Some(addr);
    (addr, vault)
}

/// Today's channel date suffix.
pub fn today() -> String {
    chrono::Utc::now().date_naive().format("%Y.%m.%d").to_string()
}
