// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Background task that evicts idle admission sessions

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::controller::AdmissionController;

/// Shortest sweep period accepted by [`SessionReaper::spawn`]
pub const MIN_REAP_PERIOD: Duration = Duration::from_millis(1);

/// Periodic sweeper for the admission session map
pub struct SessionReaper;

impl SessionReaper {
    /// Spawn the reaper on the current tokio runtime.
    ///
    /// The first sweep happens one full `period` after spawning. A zero
    /// period is raised to [`MIN_REAP_PERIOD`].
    pub fn spawn(controller: Arc<AdmissionController>, period: Duration) -> ReaperHandle {
        let period = if period.is_zero() {
            warn!(
                "Zero reap period requested, using {:?}",
                MIN_REAP_PERIOD
            );
            MIN_REAP_PERIOD
        } else {
            period
        };
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            info!("Session reaper started (every {:?})", period);
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval() fires immediately; skip that tick
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = controller.reap_expired();
                        debug!(
                            "Reaper sweep evicted {} sessions, {} tracked",
                            evicted,
                            controller.tracked_sessions()
                        );
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Session reaper stopping");
                        break;
                    }
                }
            }
        });

        ReaperHandle {
            shutdown_tx,
            handle: Some(handle),
        }
    }
}

/// Handle to a running reaper task
pub struct ReaperHandle {
    shutdown_tx: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ReaperHandle {
    /// Stop the reaper and wait for the task to finish
    pub async fn shutdown(mut self) {
        self.shutdown_tx.send(()).await.ok();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Session reaper task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
