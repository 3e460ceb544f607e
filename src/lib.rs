// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod admission;
pub mod api;
pub mod config;
pub mod gate;
pub mod identity;
pub mod runtime;
pub mod storage;
pub mod telemetry;

// Re-export main types
pub use admission::{
    AdmissionConfig, AdmissionController, Decision, RejectReason, Rejection, SessionReaper,
};
pub use config::{ConfigError, CoreConfig};
pub use gate::{
    GeneratedImage, GenerationError, GenerationGate, GenerationOutcome, GenerationRequest,
    ImageProvider,
};
pub use identity::{OwnerId, SessionKey, ANONYMOUS_OWNER};
pub use runtime::CoreRuntime;
pub use storage::{
    ArtifactPayload, ArtifactRecord, ArtifactStore, HistoryBackend, HistoryStats, StoreConfig,
    StoreError,
};
