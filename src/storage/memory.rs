// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-lifetime in-memory tier

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::artifact::{History, HistoryMutation};
use super::backend::{HistoryBackend, StoreError};
use crate::identity::OwnerId;

/// Mutex-guarded owner → history map. Never fails.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    histories: Mutex<HashMap<OwnerId, History>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of owners with a stored history
    pub fn owner_count(&self) -> usize {
        self.histories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl HistoryBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, owner: &OwnerId) -> Result<History, StoreError> {
        let histories = self.histories.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(histories.get(owner).cloned().unwrap_or_default())
    }

    async fn apply(
        &self,
        owner: &OwnerId,
        mutation: &HistoryMutation,
    ) -> Result<bool, StoreError> {
        let mut histories = self.histories.lock().unwrap_or_else(PoisonError::into_inner);
        let history = histories.entry(owner.clone()).or_default();
        let changed = mutation.apply_to(history);
        if history.is_empty() {
            histories.remove(owner);
        }
        Ok(changed)
    }
}
