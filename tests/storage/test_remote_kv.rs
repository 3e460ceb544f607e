// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tests for the remote key-value tier against a local stub service

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use tracklist_art::storage::{
    ArtifactPayload, ArtifactStore, HistoryBackend, RemoteKvConfig, RestKvBackend, StoreConfig,
    StoreError,
};
use tracklist_art::OwnerId;

const TOKEN: &str = "test-token";

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Normal,
    /// 200 with a body that is not a command reply
    Garbage,
    /// 500 with an error envelope
    Failing,
}

struct StubKv {
    values: Mutex<HashMap<String, String>>,
    mode: Mutex<Mode>,
}

impl StubKv {
    fn set_mode(&self, mode: Mode) {
        *self.mode.lock().unwrap() = mode;
    }

    fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn seed(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

async fn handle_command(
    State(kv): State<Arc<StubKv>>,
    headers: HeaderMap,
    Json(command): Json<Vec<Value>>,
) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == format!("Bearer {}", TOKEN));
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"}))).into_response();
    }

    let mode = *kv.mode.lock().unwrap();
    match mode {
        Mode::Garbage => return (StatusCode::OK, "<html>maintenance</html>").into_response(),
        Mode::Failing => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "backend unavailable"})),
            )
                .into_response()
        }
        Mode::Normal => {}
    }

    let verb = command.first().and_then(Value::as_str).unwrap_or_default();
    let key = command
        .get(1)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let reply = match verb {
        "GET" => match kv.raw(&key) {
            Some(value) => json!({ "result": value }),
            None => json!({ "result": null }),
        },
        "SET" => match command.get(2).and_then(Value::as_str) {
            Some(value) => {
                kv.seed(&key, value);
                json!({ "result": "OK" })
            }
            None => json!({ "error": "ERR wrong number of arguments" }),
        },
        other => json!({ "error": format!("ERR unknown command '{}'", other) }),
    };
    Json(reply).into_response()
}

async fn start_stub() -> (Arc<StubKv>, SocketAddr) {
    let kv = Arc::new(StubKv {
        values: Mutex::new(HashMap::new()),
        mode: Mutex::new(Mode::Normal),
    });
    let app = Router::new()
        .route("/", post(handle_command))
        .with_state(kv.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (kv, addr)
}

fn remote_config(addr: SocketAddr, token: Option<&str>) -> RemoteKvConfig {
    RemoteKvConfig {
        url: format!("http://{}", addr),
        token: token.map(str::to_string),
        timeout: Duration::from_secs(2),
    }
}

fn payload(image: &str) -> ArtifactPayload {
    ArtifactPayload {
        image_url: image.to_string(),
        songs: vec!["Intro".to_string()],
        ..ArtifactPayload::default()
    }
}

#[tokio::test]
async fn test_remote_round_trip() {
    let (kv, addr) = start_stub().await;
    let config = StoreConfig {
        remote: Some(remote_config(addr, Some(TOKEN))),
        ..StoreConfig::default()
    };
    let store = ArtifactStore::from_config(&config).await;
    assert_eq!(store.tier_names(), vec!["remote-kv", "memory"]);

    let owner = OwnerId::new("user-remote");
    let first = store.append(&owner, payload("a")).await;
    let second = store.append(&owner, payload("b")).await;

    assert_eq!(store.list(&owner).await, vec![second, first.clone()]);

    // Stored as a JSON string under the owner's key
    let raw = kv.raw("history:user-remote").expect("key should be written");
    let stored: Vec<Value> = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored.len(), 2);

    assert!(store.remove(&owner, &first.id).await);
    assert_eq!(store.list(&owner).await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_lose_nothing() {
    let (kv, addr) = start_stub().await;
    let backend = assert_ok!(RestKvBackend::new(&remote_config(addr, Some(TOKEN))));
    let store = Arc::new(ArtifactStore::with_tiers(vec![Arc::new(backend)], 50));
    let owner = OwnerId::new("user-concurrent");

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let store = store.clone();
            let owner = owner.clone();
            tokio::spawn(async move { store.append(&owner, payload(&format!("img-{}", i))).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().id);
    }

    let history = store.list(&owner).await;
    assert_eq!(history.len(), 20);
    for id in &ids {
        assert!(history.iter().any(|r| &r.id == id), "Missing record {}", id);
    }

    // Everything landed in the remote tier, not the memory fallback
    let raw = kv.raw("history:user-concurrent").expect("key should be written");
    let stored: Vec<Value> = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored.len(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_removes_and_appends_stay_consistent() {
    let (_kv, addr) = start_stub().await;
    let backend = assert_ok!(RestKvBackend::new(&remote_config(addr, Some(TOKEN))));
    let store = Arc::new(ArtifactStore::with_tiers(vec![Arc::new(backend)], 50));
    let owner = OwnerId::new("user-mixed");

    let mut existing = Vec::new();
    for i in 0..10 {
        existing.push(store.append(&owner, payload(&format!("old-{}", i))).await.id);
    }

    let removals: Vec<_> = existing
        .iter()
        .cloned()
        .map(|id| {
            let store = store.clone();
            let owner = owner.clone();
            tokio::spawn(async move { store.remove(&owner, &id).await })
        })
        .collect();
    let appends: Vec<_> = (0..10)
        .map(|i| {
            let store = store.clone();
            let owner = owner.clone();
            tokio::spawn(async move { store.append(&owner, payload(&format!("new-{}", i))).await })
        })
        .collect();

    for removal in removals {
        assert!(removal.await.unwrap());
    }
    let mut added = Vec::new();
    for append in appends {
        added.push(append.await.unwrap().id);
    }

    let history = store.list(&owner).await;
    assert_eq!(history.len(), 10);
    assert!(added.iter().all(|id| history.iter().any(|r| &r.id == id)));
    assert!(existing.iter().all(|id| history.iter().all(|r| &r.id != id)));
}

#[tokio::test]
async fn test_malformed_stored_value_reads_empty() {
    let (kv, addr) = start_stub().await;
    kv.seed("history:user-corrupt", "{not json");

    let backend = RestKvBackend::new(&remote_config(addr, Some(TOKEN))).unwrap();
    let owner = OwnerId::new("user-corrupt");
    assert!(assert_ok!(backend.load(&owner).await).is_empty());

    // Appending replaces the corrupt value
    let store = ArtifactStore::with_tiers(vec![Arc::new(backend)], 50);
    let record = store.append(&owner, payload("fresh")).await;
    assert_eq!(store.list(&owner).await, vec![record]);
}

#[tokio::test]
async fn test_non_envelope_reply_falls_back() {
    let (kv, addr) = start_stub().await;
    kv.set_mode(Mode::Garbage);

    let backend = RestKvBackend::new(&remote_config(addr, Some(TOKEN))).unwrap();
    let owner = OwnerId::new("user-garbage");
    let err = assert_err!(backend.load(&owner).await);
    assert!(matches!(err, StoreError::MalformedResponse(_)));

    let store = ArtifactStore::with_tiers(vec![Arc::new(backend)], 50);
    let record = store.append(&owner, payload("a")).await;
    assert_eq!(store.list(&owner).await, vec![record]);
    assert!(kv.raw("history:user-garbage").is_none());
}

#[tokio::test]
async fn test_server_error_is_reported() {
    let (kv, addr) = start_stub().await;
    kv.set_mode(Mode::Failing);

    let backend = RestKvBackend::new(&remote_config(addr, Some(TOKEN))).unwrap();
    match backend.load(&OwnerId::new("user")).await {
        Err(StoreError::Server { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "backend unavailable");
        }
        other => panic!("expected server error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_wrong_token_is_auth_error() {
    let (_kv, addr) = start_stub().await;
    let backend = RestKvBackend::new(&remote_config(addr, Some("wrong"))).unwrap();

    let err = assert_err!(backend.load(&OwnerId::new("user")).await);
    assert!(matches!(err, StoreError::Auth(_)));
}

#[tokio::test]
async fn test_missing_token_falls_back_to_memory() {
    let (kv, addr) = start_stub().await;
    let config = StoreConfig {
        remote: Some(remote_config(addr, None)),
        ..StoreConfig::default()
    };
    let store = ArtifactStore::from_config(&config).await;
    assert_eq!(store.tier_names(), vec!["remote-kv", "memory"]);

    let owner = OwnerId::new("user-no-token");
    store.append(&owner, payload("a")).await;
    assert_eq!(store.list(&owner).await.len(), 1);
    assert!(kv.raw("history:user-no-token").is_none());
}

#[tokio::test]
async fn test_unreachable_remote_falls_back() {
    // Bind then drop to get a port nothing listens on
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let backend = RestKvBackend::new(&remote_config(addr, Some(TOKEN))).unwrap();
    let store = ArtifactStore::with_tiers(vec![Arc::new(backend)], 50);

    let owner = OwnerId::new("user-offline");
    let record = store.append(&owner, payload("a")).await;
    assert_eq!(store.list(&owner).await, vec![record]);
}
