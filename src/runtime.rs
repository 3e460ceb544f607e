// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Lifecycle of the admission and storage core
//!
//! Built once at process start, shut down explicitly. Tests construct their
//! own runtime (or the components directly) for isolated state.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::admission::{AdmissionController, ReaperHandle, SessionReaper};
use crate::config::CoreConfig;
use crate::gate::GenerationGate;
use crate::storage::ArtifactStore;

pub struct CoreRuntime {
    admission: Arc<AdmissionController>,
    store: Arc<ArtifactStore>,
    reaper: ReaperHandle,
}

impl CoreRuntime {
    /// Validate configuration, build the store tiers and start the reaper.
    /// Must be called from within a tokio runtime.
    pub async fn start(config: CoreConfig) -> Result<Self> {
        config.validate().context("invalid core configuration")?;

        let admission = Arc::new(AdmissionController::new(config.admission.clone()));
        let store = Arc::new(ArtifactStore::from_config(&config.store).await);
        let reaper = SessionReaper::spawn(admission.clone(), config.admission.reap_interval);

        info!(
            "Core runtime started (session cap {}, history cap {})",
            config.admission.session_cap, config.store.history_cap
        );

        Ok(Self {
            admission,
            store,
            reaper,
        })
    }

    pub fn admission(&self) -> Arc<AdmissionController> {
        self.admission.clone()
    }

    pub fn store(&self) -> Arc<ArtifactStore> {
        self.store.clone()
    }

    pub fn gate(&self) -> GenerationGate {
        GenerationGate::new(self.admission.clone(), self.store.clone())
    }

    /// Stop background work. In-memory session state is dropped with the
    /// runtime; nothing is persisted.
    pub async fn shutdown(self) {
        self.reaper.shutdown().await;
        info!("Core runtime stopped");
    }
}
