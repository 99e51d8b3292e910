//! Error taxonomy for the guard.
//!
//! Only [`BreakerError::CircuitOpen`] ever reaches a client (as a 403 response).
//! Every other variant is reduced to a state transition or a log line.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BreakerError {
    /// A configuration field was invalid or empty and was replaced by its default.
    #[error("breaker configuration field `{field}` defaulted: {reason}")]
    ConfigurationDefaulted { field: &'static str, reason: String },

    /// The circuit for `key` is open; the request was never forwarded.
    #[error("circuit open for `{key}`, next probe in {retry_after:?}")]
    CircuitOpen { key: String, retry_after: Duration },

    /// The downstream call completed with a non-success classification, or never completed.
    #[error("downstream failure for `{key}` (status: {status:?})")]
    DownstreamFailure {
        key: String,
        status: Option<StatusCode>,
    },

    /// A stored state failed its invariants on read and was re-initialised.
    #[error("stored breaker state for `{key}` was inconsistent and has been re-initialised")]
    StoreCorruption { key: String },
}

impl BreakerError {
    pub fn configuration_defaulted(field: &'static str, reason: impl Into<String>) -> Self {
        Self::ConfigurationDefaulted {
            field,
            reason: reason.into(),
        }
    }
}
