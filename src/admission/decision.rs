// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Admission decisions and rejection reasons

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Why a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Lifetime cap for the session key reached
    SessionLimit,
    /// Previous request was too recent
    Cooldown,
    /// Sliding window is full
    RateLimit,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::SessionLimit => "session_limit",
            RejectReason::Cooldown => "cooldown",
            RejectReason::RateLimit => "rate_limit",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A refused admission check with a retry hint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectReason,
    pub message: String,
    pub retry_after: Duration,
}

impl Rejection {
    pub(crate) fn session_limit(cap: u32, retry_after: Duration) -> Self {
        Self {
            reason: RejectReason::SessionLimit,
            message: format!(
                "Session limit of {} generations reached. Start a new session to continue.",
                cap
            ),
            retry_after,
        }
    }

    pub(crate) fn cooldown(retry_after: Duration) -> Self {
        Self {
            reason: RejectReason::Cooldown,
            message: format!(
                "Please wait {}s before generating again.",
                ceil_secs(retry_after)
            ),
            retry_after,
        }
    }

    pub(crate) fn rate_limit(capacity: usize, window: Duration, retry_after: Duration) -> Self {
        Self {
            reason: RejectReason::RateLimit,
            message: format!(
                "Too many requests ({} per {}s). Retry in {}s.",
                capacity,
                window.as_secs(),
                ceil_secs(retry_after)
            ),
            retry_after,
        }
    }

    /// Retry hint in milliseconds, as sent to clients
    pub fn retry_after_ms(&self) -> u64 {
        self.retry_after.as_millis().min(u64::MAX as u128) as u64
    }

    /// Retry hint rounded up to whole seconds (for `Retry-After` headers)
    pub fn retry_after_secs(&self) -> u64 {
        ceil_secs(self.retry_after)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (retry after {}ms)",
            self.reason,
            self.message,
            self.retry_after_ms()
        )
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Rejected(Rejection),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Decision::Allowed => None,
            Decision::Rejected(rejection) => Some(rejection),
        }
    }

    /// Convert into a `Result`, so callers can use `?`
    pub fn into_result(self) -> Result<(), Rejection> {
        match self {
            Decision::Allowed => Ok(()),
            Decision::Rejected(rejection) => Err(rejection),
        }
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
