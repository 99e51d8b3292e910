//! Resilience subsystem: the per-target circuit breaker.
//!
//! # Data Flow
//! ```text
//! Request for target:
//!     → store.rs (get or create the state for the target's key)
//!     → circuit_breaker.rs (admit, probe or reject)
//!     → [downstream call, no lock held]
//!     → classifier.rs (status → success/failure)
//!     → circuit_breaker.rs (shift window, trip/escalate/close)
//!     → events.rs (structured event to the configured sink)
//! ```
//!
//! # Design Decisions
//! - Admission and outcome recording are two short critical sections per key
//! - Keys are independent; no lock spans more than one key
//! - Bookkeeping problems never fail a request; they reset state instead

pub mod circuit_breaker;
pub mod classifier;
pub mod events;
pub mod guard;
pub mod store;
pub mod window;

pub use circuit_breaker::{Admission, BreakerConfig, SlidingWindowBreaker};
pub use classifier::{Outcome, OutcomeClassifier};
pub use events::{BreakerEvent, Decision, EventKind, EventSink, Transition};
pub use guard::{CircuitGuard, Permit};
pub use store::{Granularity, WindowStore, GLOBAL_KEY};
pub use window::BreakerState;
