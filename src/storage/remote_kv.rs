// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Remote key-value tier over a REST command API
//!
//! Speaks the Upstash-style protocol: a command is POSTed as a JSON array
//! (`["GET", key]`, `["SET", key, value]`) with a bearer token, and the reply
//! is `{"result": ...}` or `{"error": "..."}`. An owner's history is stored
//! under `history:{owner}` as a JSON string.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tracing::debug;

use super::artifact::{decode_history, decode_history_value, History, HistoryMutation};
use super::backend::{HistoryBackend, StoreError};
use super::config::RemoteKvConfig;
use crate::identity::OwnerId;

const KEY_PREFIX: &str = "history:";

#[derive(Debug, Deserialize)]
struct CommandReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

type OwnerLocks = std::sync::Mutex<HashMap<OwnerId, Arc<Mutex<()>>>>;

/// History tier stored in a remote REST key-value service.
///
/// A mutation is a GET followed by a SET, so mutations for one owner are
/// serialized through a per-owner lock shared by all clones of the backend.
#[derive(Debug, Clone)]
pub struct RestKvBackend {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    owner_locks: Arc<OwnerLocks>,
}

impl RestKvBackend {
    pub fn new(config: &RemoteKvConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            owner_locks: Arc::new(std::sync::Mutex::new(HashMap::new())),
        })
    }

    fn owner_lock(&self, owner: &OwnerId) -> Arc<Mutex<()>> {
        let mut locks = self
            .owner_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(owner.clone()).or_default().clone()
    }

    /// Drop the owner's lock entry once nobody else holds or waits on it
    fn release_owner_lock(&self, owner: &OwnerId, lock: Arc<Mutex<()>>) {
        let mut locks = self
            .owner_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(owner);
        }
    }

    /// Owners with a lock entry, for tests
    #[cfg(test)]
    fn tracked_owner_locks(&self) -> usize {
        self.owner_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn read_modify_write(
        &self,
        owner: &OwnerId,
        mutation: &HistoryMutation,
    ) -> Result<bool, StoreError> {
        let mut history = self.load(owner).await?;
        if !mutation.apply_to(&mut history) {
            return Ok(false);
        }

        let value = serde_json::to_string(&history)?;
        self.command(json!(["SET", Self::key(owner), value])).await?;
        debug!(
            "Wrote {} records for owner {} to remote store",
            history.len(),
            owner
        );
        Ok(true)
    }

    pub fn has_credentials(&self) -> bool {
        self.token.is_some()
    }

    fn key(owner: &OwnerId) -> String {
        format!("{}{}", KEY_PREFIX, owner)
    }

    async fn command(&self, args: Value) -> Result<Value, StoreError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| StoreError::MissingCredentials("remote key-value store".to_string()))?;

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .json(&args)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StoreError::Timeout(e.to_string())
                } else {
                    StoreError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(StoreError::Auth(format!("remote store returned {}", status)));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout(e.to_string())
            } else {
                StoreError::Network(e.to_string())
            }
        })?;

        let reply: Option<CommandReply> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = reply
                .and_then(|r| r.error)
                .unwrap_or_else(|| truncate(&body, 200));
            return Err(StoreError::Server {
                status: status.as_u16(),
                message,
            });
        }

        match reply {
            Some(CommandReply {
                error: Some(error), ..
            }) => Err(StoreError::Rejected(error)),
            Some(CommandReply { result, .. }) => Ok(result.unwrap_or(Value::Null)),
            None => Err(StoreError::MalformedResponse(truncate(&body, 200))),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[async_trait]
impl HistoryBackend for RestKvBackend {
    fn name(&self) -> &'static str {
        "remote-kv"
    }

    async fn load(&self, owner: &OwnerId) -> Result<History, StoreError> {
        let result = self.command(json!(["GET", Self::key(owner)])).await?;
        Ok(match result {
            Value::Null => Vec::new(),
            Value::String(raw) => decode_history(owner, &raw),
            other => decode_history_value(owner, other),
        })
    }

    async fn apply(
        &self,
        owner: &OwnerId,
        mutation: &HistoryMutation,
    ) -> Result<bool, StoreError> {
        let lock = self.owner_lock(owner);
        let result = {
            let _guard = lock.lock().await;
            self.read_modify_write(owner, mutation).await
        };
        self.release_owner_lock(owner, lock);
        result
    }
}
