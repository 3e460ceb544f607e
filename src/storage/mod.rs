// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod artifact;
pub mod backend;
pub mod config;
pub mod file;
pub mod memory;
pub mod remote_kv;
pub mod store;

// Re-export main types for convenience
pub use artifact::{
    decode_history, decode_history_value, ArtifactPayload, ArtifactRecord, History,
    HistoryMutation, HistoryStats,
};
pub use backend::{HistoryBackend, StoreError};
pub use config::{RemoteKvConfig, StoreConfig, DEFAULT_HISTORY_CAP};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use remote_kv::RestKvBackend;
pub use store::ArtifactStore;
