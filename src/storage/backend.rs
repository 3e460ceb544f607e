// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Storage tier abstraction for artifact history

use async_trait::async_trait;
use thiserror::Error;

use super::artifact::{History, HistoryMutation};
use crate::identity::OwnerId;

/// Failures of a single storage tier. The store recovers from all of them
/// by falling back to the next tier.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Missing credentials for {0}")]
    MissingCredentials(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Server error: {status} {message}")]
    Server { status: u16, message: String },
    #[error("Command rejected by backend: {0}")]
    Rejected(String),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// One tier of the artifact store. Each tier holds an owner's entire
/// history as a single value.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Read the full history for an owner, newest first.
    ///
    /// A stored value that cannot be decoded is returned as an empty history,
    /// not as an error.
    async fn load(&self, owner: &OwnerId) -> Result<History, StoreError>;

    /// Apply a mutation as one read-modify-write on the owner's history.
    /// Returns whether the history changed.
    async fn apply(&self, owner: &OwnerId, mutation: &HistoryMutation)
        -> Result<bool, StoreError>;
}
