// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for per-session admission control

use std::env;
use std::time::Duration;

use crate::config::ConfigError;

/// Limits applied to every session key
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionConfig {
    /// Lifetime request cap per session key
    pub session_cap: u32,
    /// Minimum gap between two accepted requests
    pub cooldown: Duration,
    /// Sliding window length for the per-window cap
    pub window: Duration,
    /// Maximum accepted requests inside one window
    pub window_capacity: usize,
    /// How long request timestamps are kept before pruning
    pub retention: Duration,
    /// Inactivity after which a session record is reaped
    pub session_timeout: Duration,
    /// Period of the background reaper
    pub reap_interval: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            session_cap: 10,
            cooldown: Duration::from_secs(30),
            window: Duration::from_secs(60),
            window_capacity: 3,
            retention: Duration::from_secs(120),
            session_timeout: Duration::from_secs(30 * 60),
            reap_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl AdmissionConfig {
    /// Load limits from `ADMISSION_*` environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            session_cap: env_parse("ADMISSION_SESSION_CAP").unwrap_or(defaults.session_cap),
            cooldown: env_secs("ADMISSION_COOLDOWN_SECS").unwrap_or(defaults.cooldown),
            window: env_secs("ADMISSION_WINDOW_SECS").unwrap_or(defaults.window),
            window_capacity: env_parse("ADMISSION_WINDOW_CAPACITY")
                .unwrap_or(defaults.window_capacity),
            retention: defaults.retention,
            session_timeout: env_secs("ADMISSION_SESSION_TIMEOUT_SECS")
                .unwrap_or(defaults.session_timeout),
            reap_interval: env_secs("ADMISSION_REAP_INTERVAL_SECS")
                .unwrap_or(defaults.reap_interval),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_cap == 0 {
            return Err(ConfigError::invalid("session_cap", "must be greater than 0"));
        }
        if self.window.is_zero() {
            return Err(ConfigError::invalid("window", "must be greater than 0"));
        }
        if self.window_capacity == 0 {
            return Err(ConfigError::invalid(
                "window_capacity",
                "must be greater than 0",
            ));
        }
        if self.retention < self.window {
            return Err(ConfigError::invalid(
                "retention",
                "must be at least as long as the window",
            ));
        }
        if self.reap_interval.is_zero() {
            return Err(ConfigError::invalid("reap_interval", "must be greater than 0"));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_secs)
}
