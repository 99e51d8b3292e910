//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID, breaker key)
//!     → middleware/circuit_breaker.rs (admit or 403)
//!     → server.rs forward handler (one upstream call)
//!     → middleware/circuit_breaker.rs (record status)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{request_target, MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{guarded_router, GuardServer};
