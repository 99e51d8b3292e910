//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker events (admission, outcome, transition):
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The breaker emits events as data; only this subsystem performs I/O
//! - Request ID flows through request spans (tower-http)

pub mod logging;
pub mod metrics;
