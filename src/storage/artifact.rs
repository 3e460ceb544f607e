// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Artifact records and per-owner history helpers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

use crate::identity::OwnerId;

/// An owner's history, newest first
pub type History = Vec<ArtifactRecord>;

/// Result data of one generation. Only `songs` is interpreted by the store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactPayload {
    /// Reference to the generated image
    pub image_url: String,
    /// Source song titles the artwork was generated from
    #[serde(default)]
    pub songs: Vec<String>,
    /// Free-form descriptive metadata (title, mood, palette, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Prompt text sent to the image provider
    #[serde(default)]
    pub prompt: String,
}

/// A persisted generation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    /// Time-ordered unique id (UUIDv7)
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub owner_id: OwnerId,
    pub payload: ArtifactPayload,
}

impl ArtifactRecord {
    pub fn new(owner_id: OwnerId, payload: ArtifactPayload) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            created_at: Utc::now(),
            owner_id,
            payload,
        }
    }
}

/// Summary of an owner's history
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub count: usize,
    pub distinct_song_count: usize,
    pub most_recent_timestamp: Option<DateTime<Utc>>,
}

impl HistoryStats {
    pub fn from_history(history: &[ArtifactRecord]) -> Self {
        let songs: HashSet<&str> = history
            .iter()
            .flat_map(|record| record.payload.songs.iter().map(String::as_str))
            .collect();

        Self {
            count: history.len(),
            distinct_song_count: songs.len(),
            most_recent_timestamp: history.iter().map(|r| r.created_at).max(),
        }
    }
}

/// A change to one owner's history, applied atomically by a tier
#[derive(Debug, Clone)]
pub enum HistoryMutation {
    /// Put a record at the front and truncate to `cap`
    Prepend { record: ArtifactRecord, cap: usize },
    /// Drop the record with the given id, if present
    Remove { artifact_id: String },
}

impl HistoryMutation {
    /// Apply to an in-memory history. Returns whether anything changed.
    pub fn apply_to(&self, history: &mut History) -> bool {
        match self {
            HistoryMutation::Prepend { record, cap } => {
                history.insert(0, record.clone());
                history.truncate(*cap);
                true
            }
            HistoryMutation::Remove { artifact_id } => {
                let before = history.len();
                history.retain(|r| &r.id != artifact_id);
                history.len() != before
            }
        }
    }
}

/// Decode a stored history string.
///
/// Malformed data is logged and treated as an empty history.
pub fn decode_history(owner: &OwnerId, raw: &str) -> History {
    match serde_json::from_str::<History>(raw) {
        Ok(history) => history,
        Err(e) => {
            warn!(
                "Discarding malformed history for owner {}: {}",
                owner, e
            );
            Vec::new()
        }
    }
}

/// Decode a stored history value; see [`decode_history`]
pub fn decode_history_value(owner: &OwnerId, value: Value) -> History {
    if value.is_null() {
        return Vec::new();
    }
    match serde_json::from_value::<History>(value) {
        Ok(history) => history,
        Err(e) => {
            warn!(
                "Discarding malformed history for owner {}: {}",
                owner, e
            );
            Vec::new()
        }
    }
}
