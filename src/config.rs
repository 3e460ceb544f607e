// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-level configuration for the admission and storage core

use thiserror::Error;
use tracing::debug;

use crate::admission::AdmissionConfig;
use crate::storage::StoreConfig;

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: &str) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Complete configuration for [`crate::runtime::CoreRuntime`]
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub admission: AdmissionConfig,
    pub store: StoreConfig,
}

impl CoreConfig {
    /// Read configuration from environment variables only
    pub fn from_env() -> Self {
        Self {
            admission: AdmissionConfig::from_env(),
            store: StoreConfig::from_env(),
        }
    }

    /// Load a `.env` file if one exists, then read the environment
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenv::dotenv() {
            debug!("Loaded environment from {:?}", path);
        }
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.admission.validate()?;
        self.store.validate()?;
        Ok(())
    }
}
