// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Generation request path: admission, provider call, history append

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::admission::{AdmissionController, Decision, Rejection};
use crate::identity::{OwnerId, SessionKey};
use crate::storage::{ArtifactPayload, ArtifactRecord, ArtifactStore};

/// Maximum number of source songs accepted per request
pub const MAX_SONGS: usize = 50;

/// Artwork generation request from the endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Prompt text for the image provider
    pub prompt: String,

    /// Source song titles
    #[serde(default)]
    pub songs: Vec<String>,

    /// Descriptive metadata carried into the stored artifact
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl GenerationRequest {
    /// Validate the generation request
    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("prompt must not be empty".to_string());
        }

        if self.songs.len() > MAX_SONGS {
            return Err(format!(
                "at most {} songs allowed, got {}",
                MAX_SONGS,
                self.songs.len()
            ));
        }

        if self.songs.iter().any(|s| s.trim().is_empty()) {
            return Err("song titles must not be empty".to_string());
        }

        Ok(())
    }
}

/// Image returned by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub image_url: String,
    #[serde(default)]
    pub model: Option<String>,
}

/// External image-generation service
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<GeneratedImage>;
}

/// Result of a gated generation
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    /// Generated and recorded in the owner's history
    Created(ArtifactRecord),
    /// Refused by admission control; the provider was not called
    Throttled(Rejection),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Image generation failed: {0}")]
    Provider(String),
}

/// Sequences admission, the provider call and history persistence
#[derive(Clone)]
pub struct GenerationGate {
    admission: Arc<AdmissionController>,
    store: Arc<ArtifactStore>,
}

impl GenerationGate {
    pub fn new(admission: Arc<AdmissionController>, store: Arc<ArtifactStore>) -> Self {
        Self { admission, store }
    }

    pub fn admission(&self) -> &Arc<AdmissionController> {
        &self.admission
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    /// Run one generation.
    ///
    /// Pipeline:
    /// 1. Validate request (invalid requests do not consume quota)
    /// 2. Admission check; a rejection returns without contacting the provider
    /// 3. Call the image provider
    /// 4. Append the result to the owner's history (never fails)
    pub async fn generate(
        &self,
        session: &SessionKey,
        owner: &OwnerId,
        request: &GenerationRequest,
        provider: &dyn ImageProvider,
    ) -> Result<GenerationOutcome, GenerationError> {
        if let Err(e) = request.validate() {
            warn!("Generation request validation failed: {}", e);
            return Err(GenerationError::InvalidRequest(e));
        }

        if let Decision::Rejected(rejection) = self.admission.check(session) {
            return Ok(GenerationOutcome::Throttled(rejection));
        }

        let started = Instant::now();
        let image = provider.generate(&request.prompt).await.map_err(|e| {
            warn!("Image provider failed for session {}: {}", session, e);
            GenerationError::Provider(e.to_string())
        })?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!("Image provider answered in {}ms", elapsed_ms);

        let mut metadata = request.metadata.clone();
        if let Some(model) = &image.model {
            metadata.insert("model".to_string(), Value::String(model.clone()));
        }
        metadata.insert("processingTimeMs".to_string(), Value::from(elapsed_ms));

        let payload = ArtifactPayload {
            image_url: image.image_url,
            songs: request.songs.clone(),
            metadata,
            prompt: request.prompt.clone(),
        };

        let record = self.store.append(owner, payload).await;
        info!(
            "Artwork {} generated for owner {} ({} songs, {}ms)",
            record.id,
            owner,
            record.payload.songs.len(),
            elapsed_ms
        );
        Ok(GenerationOutcome::Created(record))
    }
}
