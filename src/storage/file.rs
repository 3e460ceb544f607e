// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Durable local file tier
//!
//! The whole file is one JSON object keyed by owner id, each value an array
//! of artifacts (newest first). It is read once at startup and rewritten in
//! full on every mutation, via a temp file and rename.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use super::artifact::{decode_history_value, History, HistoryMutation};
use super::backend::{HistoryBackend, StoreError};
use crate::identity::OwnerId;

struct FileState {
    path: PathBuf,
    /// Raw per-owner values; decoded lazily so one corrupt owner does not
    /// poison the rest of the file
    entries: Map<String, Value>,
}

/// History tier backed by a single JSON file
pub struct FileBackend {
    state: Arc<Mutex<FileState>>,
}

impl FileBackend {
    /// Load the history file, starting empty when it is missing or unreadable
    /// as JSON. Other I/O errors are returned.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => Map::new(),
            Ok(contents) => match serde_json::from_str::<Map<String, Value>>(&contents) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        "History file {:?} is not a JSON object, starting empty: {}",
                        path, e
                    );
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("History file {:?} does not exist yet", path);
                Map::new()
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "Loaded history file {:?} ({} owners)",
            path,
            entries.len()
        );

        Ok(Self {
            state: Arc::new(Mutex::new(FileState { path, entries })),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .path
            .clone()
    }
}

fn persist(path: &Path, entries: &Map<String, Value>) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_vec_pretty(entries)?;
    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, json)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

#[async_trait]
impl HistoryBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load(&self, owner: &OwnerId) -> Result<History, StoreError> {
        let state = self.state.clone();
        let key = owner.as_str().to_string();

        // The lock can be held across a whole-file rewrite; wait for it off
        // the async workers.
        let value = tokio::task::spawn_blocking(move || {
            let state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.entries.get(&key).cloned()
        })
        .await
        .map_err(|e| StoreError::Io(format!("file tier task failed: {}", e)))?;

        Ok(value
            .map(|v| decode_history_value(owner, v))
            .unwrap_or_default())
    }

    async fn apply(
        &self,
        owner: &OwnerId,
        mutation: &HistoryMutation,
    ) -> Result<bool, StoreError> {
        let state = self.state.clone();
        let owner = owner.clone();
        let mutation = mutation.clone();

        // Runs to completion even if the caller is dropped, so the in-memory
        // map and the file never diverge mid-mutation.
        tokio::task::spawn_blocking(move || -> Result<bool, StoreError> {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);

            let mut history = state
                .entries
                .get(owner.as_str())
                .cloned()
                .map(|v| decode_history_value(&owner, v))
                .unwrap_or_default();

            if !mutation.apply_to(&mut history) {
                return Ok(false);
            }

            let key = owner.as_str().to_string();
            let previous = if history.is_empty() {
                state.entries.remove(&key)
            } else {
                state
                    .entries
                    .insert(key.clone(), serde_json::to_value(&history)?)
            };

            if let Err(e) = persist(&state.path, &state.entries) {
                match previous {
                    Some(value) => state.entries.insert(key, value),
                    None => state.entries.remove(&key),
                };
                return Err(e);
            }

            Ok(true)
        })
        .await
        .map_err(|e| StoreError::Io(format!("file tier task failed: {}", e)))?
    }
}
