//! Read-only admin API over the breaker store.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::resilience::CircuitGuard;

pub fn setup_admin_router(guard: Arc<CircuitGuard>, api_key: String) -> Router {
    let api_key: Arc<str> = api_key.into();
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/breakers", get(get_breakers))
        .layer(middleware::from_fn_with_state(api_key, admin_auth_middleware))
        .with_state(guard)
}
