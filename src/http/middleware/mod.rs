//! Request middleware.

pub mod circuit_breaker;

pub use circuit_breaker::circuit_breaker_middleware;
