// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-session admission controller
//!
//! Three policies are evaluated in order, first violation wins:
//! 1. lifetime session cap
//! 2. cooldown since the last accepted request
//! 3. sliding-window cap
//!
//! Only an accepted check mutates the session record.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::config::AdmissionConfig;
use super::decision::{Decision, Rejection};
use crate::identity::SessionKey;

/// Counters tracked for one session key
#[derive(Debug, Clone)]
pub struct SessionRecord {
    request_timestamps: VecDeque<Instant>,
    total_requests: u32,
    last_request_at: Option<Instant>,
    created_at: Instant,
}

impl SessionRecord {
    fn new(now: Instant) -> Self {
        Self {
            request_timestamps: VecDeque::new(),
            total_requests: 0,
            last_request_at: None,
            created_at: now,
        }
    }

    fn last_activity(&self) -> Instant {
        self.last_request_at.unwrap_or(self.created_at)
    }

    fn in_window(&self, now: Instant, window: Duration) -> impl Iterator<Item = &Instant> {
        self.request_timestamps
            .iter()
            .filter(move |&&t| now.saturating_duration_since(t) < window)
    }

    fn prune(&mut self, now: Instant, retention: Duration) {
        while let Some(&front) = self.request_timestamps.front() {
            if now.saturating_duration_since(front) >= retention {
                self.request_timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Point-in-time view of a session, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub total_requests: u32,
    pub recent_requests: usize,
    pub retained_timestamps: usize,
    pub idle_for: Duration,
}

/// Decides whether a session key may issue another generation request
pub struct AdmissionController {
    config: AdmissionConfig,
    clock: Arc<dyn Clock>,
    sessions: RwLock<HashMap<SessionKey, Mutex<SessionRecord>>>,
}

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a controller driven by a custom clock (for testing)
    pub fn with_clock(config: AdmissionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Evaluate the policies for `key` and record the request if admitted.
    ///
    /// The map read lock and the record mutex are both held for the whole
    /// evaluation, which is synchronous, so a check is never split by a
    /// cancelled caller and never overlaps a reaper sweep.
    pub fn check(&self, key: &SessionKey) -> Decision {
        {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(record) = sessions.get(key) {
                let mut record = record.lock().unwrap_or_else(PoisonError::into_inner);
                let now = self.clock.now();
                return self.apply(key, &mut record, now);
            }
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        match sessions.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied
                    .get_mut()
                    .get_mut()
                    .unwrap_or_else(PoisonError::into_inner);
                self.apply(key, record, now)
            }
            Entry::Vacant(vacant) => {
                let mut record = SessionRecord::new(now);
                let decision = self.apply(key, &mut record, now);
                if decision.is_allowed() {
                    debug!("New admission session {}", key);
                    vacant.insert(Mutex::new(record));
                }
                decision
            }
        }
    }

    fn apply(&self, key: &SessionKey, record: &mut SessionRecord, now: Instant) -> Decision {
        match self.evaluate(record, now) {
            Some(rejection) => {
                debug!(
                    "Admission rejected for session {}: {} (retry after {}ms)",
                    key,
                    rejection.reason,
                    rejection.retry_after_ms()
                );
                Decision::Rejected(rejection)
            }
            None => {
                record.request_timestamps.push_back(now);
                record.total_requests = record.total_requests.saturating_add(1);
                record.last_request_at = Some(now);
                record.prune(now, self.config.retention);
                debug!(
                    "Admission granted for session {} ({}/{})",
                    key, record.total_requests, self.config.session_cap
                );
                Decision::Allowed
            }
        }
    }

    fn evaluate(&self, record: &SessionRecord, now: Instant) -> Option<Rejection> {
        let config = &self.config;

        if record.total_requests >= config.session_cap {
            return Some(Rejection::session_limit(
                config.session_cap,
                config.session_timeout,
            ));
        }

        if let Some(last) = record.last_request_at {
            let since_last = now.saturating_duration_since(last);
            if since_last < config.cooldown {
                return Some(Rejection::cooldown(config.cooldown - since_last));
            }
        }

        let mut recent = record.in_window(now, config.window);
        if let Some(&oldest) = recent.next() {
            let count = 1 + recent.count();
            if count >= config.window_capacity {
                let age = now.saturating_duration_since(oldest);
                return Some(Rejection::rate_limit(
                    config.window_capacity,
                    config.window,
                    config.window.saturating_sub(age),
                ));
            }
        }

        None
    }

    /// Remove sessions idle for longer than the session timeout.
    ///
    /// Takes the map write lock, so it waits for in-flight checks and
    /// blocks new ones only for the duration of the sweep.
    pub fn reap_expired(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        let timeout = self.config.session_timeout;
        let before = sessions.len();

        sessions.retain(|_, record| {
            let record = record.get_mut().unwrap_or_else(PoisonError::into_inner);
            now.saturating_duration_since(record.last_activity()) <= timeout
        });

        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(
                "Reaped {} idle admission sessions ({} remaining)",
                evicted,
                sessions.len()
            );
        }
        evicted
    }

    /// Number of session records currently held
    pub fn tracked_sessions(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn snapshot(&self, key: &SessionKey) -> Option<SessionSnapshot> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let record = sessions
            .get(key)?
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        Some(SessionSnapshot {
            total_requests: record.total_requests,
            recent_requests: record.in_window(now, self.config.window).count(),
            retained_timestamps: record.request_timestamps.len(),
            idle_for: now.saturating_duration_since(record.last_activity()),
        })
    }
}
