//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the forwarding handler
//! - Wire up middleware (tracing, request ID, circuit breaker, timeout)
//! - Forward admitted requests to the upstream
//! - Serve until shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, Scheme},
        Request, StatusCode, Uri,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::{resolve_breaker_config, GuardConfig};
use crate::http::middleware::circuit_breaker_middleware;
use crate::http::request::{request_id, MakeRequestUuidV4, X_REQUEST_ID};
use crate::resilience::CircuitGuard;

/// State injected into the forwarding handler.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Authority,
}

/// Server that puts a circuit breaker in front of one upstream.
pub struct GuardServer {
    router: Router,
    config: GuardConfig,
    guard: Arc<CircuitGuard>,
}

impl GuardServer {
    /// Create a server from a validated configuration.
    pub fn new(config: GuardConfig) -> Result<Self, axum::http::uri::InvalidUri> {
        let guard = Arc::new(CircuitGuard::new(resolve_breaker_config(&config.breaker)));
        Self::with_guard(config, guard)
    }

    /// Create a server around an existing guard.
    pub fn with_guard(
        config: GuardConfig,
        guard: Arc<CircuitGuard>,
    ) -> Result<Self, axum::http::uri::InvalidUri> {
        let upstream: Authority = config.upstream.address.parse()?;
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState { client, upstream };
        let timeout = Duration::from_secs(config.upstream.timeout_secs);
        let router = guarded_router(forward_router(state), guard.clone(), timeout);

        Ok(Self {
            router,
            config,
            guard,
        })
    }

    pub fn guard(&self) -> &Arc<CircuitGuard> {
        &self.guard
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Run the server on `listener` until a shutdown signal arrives.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        if self.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            let admin_router =
                admin::setup_admin_router(self.guard.clone(), self.config.admin.api_key.clone());
            let mut admin_shutdown = shutdown.resubscribe();
            tracing::info!(address = %self.config.admin.bind_address, "Admin API starting");
            tokio::spawn(async move {
                let served = axum::serve(admin_listener, admin_router)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = served {
                    tracing::error!(error = %e, "Admin API stopped with error");
                }
            });
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Router that forwards every path to the upstream.
fn forward_router(state: AppState) -> Router {
    Router::new()
        .route("/", any(forward_handler))
        .route("/{*path}", any(forward_handler))
        .with_state(state)
}

/// Wrap `inner` with the breaker and the ambient layers.
///
/// Outermost first: trace, request id, circuit breaker, timeout, handler.
/// The timeout sits inside the breaker so a timed-out call is recorded as a failure.
#[allow(deprecated)]
pub fn guarded_router(inner: Router, guard: Arc<CircuitGuard>, timeout: Duration) -> Router {
    inner
        .layer(TimeoutLayer::new(timeout))
        .layer(middleware::from_fn_with_state(guard, circuit_breaker_middleware))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
        .layer(TraceLayer::new_for_http())
}

/// Forward one request to the upstream exactly once.
async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request_id(&request).to_string();
    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(axum::http::uri::PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
            return (StatusCode::BAD_GATEWAY, "Invalid upstream URI").into_response();
        }
    };

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
