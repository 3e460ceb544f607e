// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Client-visible throttling response for rejected admission checks

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admission::{RejectReason, Rejection};

/// JSON body sent with a 429 response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleBody {
    /// Machine-readable reason (`session_limit`, `cooldown`, `rate_limit`)
    pub error: RejectReason,
    pub message: String,
    /// Milliseconds until a retry may succeed
    pub retry_after: u64,
}

impl From<&Rejection> for ThrottleBody {
    fn from(rejection: &Rejection) -> Self {
        Self {
            error: rejection.reason,
            message: rejection.message.clone(),
            retry_after: rejection.retry_after_ms(),
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = ThrottleBody::from(&self);
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        response.headers_mut().insert(
            header::RETRY_AFTER,
            HeaderValue::from(self.retry_after_secs()),
        );
        response
    }
}
