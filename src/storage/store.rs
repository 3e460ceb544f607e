// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tiered artifact store
//!
//! Every call walks the tier chain in order and stops at the first tier that
//! answers. A failing tier is skipped for the rest of that call only; nothing
//! written to a fallback tier is reconciled back later. The in-memory tier is
//! always last.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::artifact::{ArtifactPayload, ArtifactRecord, History, HistoryMutation, HistoryStats};
use super::backend::HistoryBackend;
use super::config::{StoreConfig, DEFAULT_HISTORY_CAP};
use super::file::FileBackend;
use super::memory::MemoryBackend;
use super::remote_kv::RestKvBackend;
use crate::identity::OwnerId;

/// Per-owner artifact history behind an ordered fallback chain
pub struct ArtifactStore {
    tiers: Vec<Arc<dyn HistoryBackend>>,
    history_cap: usize,
}

impl ArtifactStore {
    /// Build the tier chain from configuration.
    ///
    /// Remote credentials select the remote tier as primary; otherwise the
    /// local file is primary. A primary that cannot be constructed is logged
    /// and skipped, leaving the memory tier.
    pub async fn from_config(config: &StoreConfig) -> Self {
        let mut primary: Vec<Arc<dyn HistoryBackend>> = Vec::new();

        match &config.remote {
            Some(remote) => match RestKvBackend::new(remote) {
                Ok(backend) => {
                    if !backend.has_credentials() {
                        warn!(
                            "Remote store URL set without token; history will fall back to memory"
                        );
                    }
                    primary.push(Arc::new(backend));
                }
                Err(e) => warn!("Remote store unavailable, using memory only: {}", e),
            },
            None => match FileBackend::open(&config.file_path).await {
                Ok(backend) => primary.push(Arc::new(backend)),
                Err(e) => warn!(
                    "History file {:?} unavailable, using memory only: {}",
                    config.file_path, e
                ),
            },
        }

        let store = Self::with_tiers(primary, config.history_cap);
        info!("Artifact store tiers: {}", store.tier_names().join(" -> "));
        store
    }

    /// Chain `primary` tiers in order, followed by a fresh memory tier
    pub fn with_tiers(primary: Vec<Arc<dyn HistoryBackend>>, history_cap: usize) -> Self {
        let mut tiers = primary;
        tiers.push(Arc::new(MemoryBackend::new()));
        Self { tiers, history_cap }
    }

    /// Memory-only store
    pub fn in_memory() -> Self {
        Self::with_tiers(Vec::new(), DEFAULT_HISTORY_CAP)
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    pub fn history_cap(&self) -> usize {
        self.history_cap
    }

    /// Record a new artifact at the front of the owner's history
    pub async fn append(&self, owner: &OwnerId, payload: ArtifactPayload) -> ArtifactRecord {
        let record = ArtifactRecord::new(owner.clone(), payload);
        let mutation = HistoryMutation::Prepend {
            record: record.clone(),
            cap: self.history_cap,
        };

        match self.apply(owner, &mutation).await {
            Some((tier, _)) => debug!(
                "Stored artifact {} for owner {} in {} tier",
                record.id, owner, tier
            ),
            None => error!(
                "Artifact {} for owner {} was not persisted in any tier",
                record.id, owner
            ),
        }
        record
    }

    /// Full history for an owner, newest first; empty when nothing is stored
    pub async fn list(&self, owner: &OwnerId) -> History {
        for tier in &self.tiers {
            match tier.load(owner).await {
                Ok(history) => return history,
                Err(e) => warn!(
                    "History read from {} tier failed for owner {}, falling back: {}",
                    tier.name(),
                    owner,
                    e
                ),
            }
        }
        Vec::new()
    }

    /// Delete one artifact. Returns whether a record was removed.
    ///
    /// Applies to the same tier a `list` in this call would read from.
    pub async fn remove(&self, owner: &OwnerId, artifact_id: &str) -> bool {
        let mutation = HistoryMutation::Remove {
            artifact_id: artifact_id.to_string(),
        };
        self.apply(owner, &mutation)
            .await
            .map_or(false, |(_, changed)| changed)
    }

    pub async fn stats(&self, owner: &OwnerId) -> HistoryStats {
        HistoryStats::from_history(&self.list(owner).await)
    }

    /// Apply a mutation to the first tier that accepts it.
    /// Returns that tier's name and whether the history changed.
    async fn apply(
        &self,
        owner: &OwnerId,
        mutation: &HistoryMutation,
    ) -> Option<(&'static str, bool)> {
        for tier in &self.tiers {
            match tier.apply(owner, mutation).await {
                Ok(changed) => return Some((tier.name(), changed)),
                Err(e) => warn!(
                    "History write to {} tier failed for owner {}, falling back: {}",
                    tier.name(),
                    owner,
                    e
                ),
            }
        }
        None
    }
}
