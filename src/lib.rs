//! Circuit guard: a per-target circuit breaker in front of an HTTP handler chain.
//!
//! Requests are admitted or rejected by a sliding-window breaker keyed by
//! request target (or one shared state for all traffic). Admitted requests are
//! forwarded once; their final status feeds back into the breaker.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::GuardConfig;
pub use error::BreakerError;
pub use http::GuardServer;
pub use lifecycle::Shutdown;
pub use resilience::{BreakerConfig, CircuitGuard, Granularity};
