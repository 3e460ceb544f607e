// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP-facing contract types consumed by the generation endpoints

pub mod throttle;

pub use throttle::ThrottleBody;
