// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the artifact store tiers

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::ConfigError;

/// Default number of artifacts kept per owner
pub const DEFAULT_HISTORY_CAP: usize = 50;

/// Connection settings for the remote REST key-value tier
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteKvConfig {
    /// Base URL of the REST endpoint
    pub url: String,
    /// Bearer token; calls fail with missing credentials when absent
    pub token: Option<String>,
    /// Per-request I/O timeout
    pub timeout: Duration,
}

/// Artifact store configuration
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Remote tier; when `None` the local file is the primary tier
    pub remote: Option<RemoteKvConfig>,
    /// Location of the durable history file
    pub file_path: PathBuf,
    /// Maximum records kept per owner
    pub history_cap: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            remote: None,
            file_path: PathBuf::from("data/history.json"),
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let remote = env::var("KV_REST_API_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|url| RemoteKvConfig {
                url: url.trim().trim_end_matches('/').to_string(),
                token: env::var("KV_REST_API_TOKEN")
                    .ok()
                    .filter(|t| !t.trim().is_empty()),
                timeout: Duration::from_millis(
                    env::var("KV_TIMEOUT_MS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(5000),
                ),
            });

        Self {
            remote,
            file_path: env::var("ARTIFACT_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/history.json")),
            history_cap: env::var("ARTIFACT_HISTORY_CAP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_HISTORY_CAP),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_cap == 0 {
            return Err(ConfigError::invalid("history_cap", "must be greater than 0"));
        }
        if let Some(remote) = &self.remote {
            if !remote.url.starts_with("http://") && !remote.url.starts_with("https://") {
                return Err(ConfigError::invalid(
                    "remote.url",
                    "must be an http(s) URL",
                ));
            }
            if remote.timeout.is_zero() {
                return Err(ConfigError::invalid(
                    "remote.timeout",
                    "must be greater than 0",
                ));
            }
        }
        if self.file_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("file_path", "must not be empty"));
        }
        Ok(())
    }

    /// Whether a remote tier will be attempted first
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }
}
