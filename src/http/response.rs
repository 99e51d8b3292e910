//! Response handling for short-circuited requests.
//!
//! # Design Decisions
//! - An open circuit answers 403 Forbidden, never touching the upstream
//! - `Retry-After` carries the remaining cooldown in whole seconds, rounded up
//! - Internal breaker conditions never become responses; they only reach logs

use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::BreakerError;

pub const X_CIRCUIT_KEY: HeaderName = HeaderName::from_static("x-circuit-key");

/// Seconds for a `Retry-After` header; at least 1 while the circuit is open.
pub fn retry_after_secs(remaining: Duration) -> u64 {
    let secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 || secs == 0 {
        secs + 1
    } else {
        secs
    }
}

impl IntoResponse for BreakerError {
    fn into_response(self) -> Response {
        match self {
            BreakerError::CircuitOpen { key, retry_after } => {
                let mut response =
                    (StatusCode::FORBIDDEN, "Forbidden: circuit open").into_response();
                let headers = response.headers_mut();
                headers.insert(
                    header::RETRY_AFTER,
                    HeaderValue::from(retry_after_secs(retry_after)),
                );
                if let Ok(value) = HeaderValue::from_str(&key) {
                    headers.insert(X_CIRCUIT_KEY, value);
                }
                response
            }
            other => {
                tracing::error!(error = %other, "Breaker error reached the response path");
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
        }
    }
}
