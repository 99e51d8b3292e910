//! Circuit breaker middleware.
//!
//! Admit or reject, forward at most once, record the outcome. The admission
//! permit is held across the downstream call; no lock is.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::{request_id, request_target};
use crate::resilience::CircuitGuard;

pub async fn circuit_breaker_middleware(
    State(guard): State<Arc<CircuitGuard>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let target = request_target(&request).to_string();
    let request_id = request_id(&request).to_string();

    tracing::debug!(request_id = %request_id, target = %target, "Request received");

    let permit = match guard.try_admit(&target) {
        Ok(permit) => permit,
        Err(rejection) => return rejection.into_response(),
    };

    // If this future is dropped here the permit records a failure.
    let response = next.run(request).await;
    let status = response.status();
    let outcome = permit.complete(status);

    tracing::debug!(
        request_id = %request_id,
        target = %target,
        status = status.as_u16(),
        outcome = outcome.as_str(),
        "Response status"
    );
    response
}
