// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-session admission control for generation requests

pub mod clock;
pub mod config;
pub mod controller;
pub mod decision;
pub mod reaper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AdmissionConfig;
pub use controller::{AdmissionController, SessionSnapshot};
pub use decision::{Decision, RejectReason, Rejection};
pub use reaper::{ReaperHandle, SessionReaper, MIN_REAP_PERIOD};
