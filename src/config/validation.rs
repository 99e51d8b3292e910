//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//! - Resolve raw breaker settings into a [`BreakerConfig`]
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Breaker settings never fail validation; bad values fall back to defaults
//!   and each fallback is logged at warn level

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::uri::Authority;
use axum::http::StatusCode;
use thiserror::Error;

use crate::config::schema::{BreakerSettings, GuardConfig};
use crate::error::BreakerError;
use crate::resilience::{BreakerConfig, Granularity};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: `{value}` is not a valid socket address")]
    InvalidSocketAddress { field: &'static str, value: String },

    #[error("upstream.address: `{0}` is not a valid host:port authority")]
    InvalidUpstream(String),

    #[error("upstream.timeout_secs must be greater than zero")]
    ZeroTimeout,
}

/// Check everything that must be right for the guard to start.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr("listener.bind_address", &config.listener.bind_address, &mut errors);
    if config.admin.enabled {
        check_socket_addr("admin.bind_address", &config.admin.bind_address, &mut errors);
    }
    if config.observability.metrics_enabled {
        check_socket_addr(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if config.upstream.address.parse::<Authority>().is_err() {
        errors.push(ValidationError::InvalidUpstream(config.upstream.address.clone()));
    }
    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidSocketAddress {
            field,
            value: value.to_string(),
        });
    }
}

/// Turn raw settings into a breaker configuration, logging every fallback.
pub fn resolve_breaker_config(settings: &BreakerSettings) -> BreakerConfig {
    let (config, defaulted) = resolve_with_report(settings);
    for error in &defaulted {
        tracing::warn!("{}", error);
    }
    config
}

/// Like [`resolve_breaker_config`] but returns the fallbacks instead of logging them.
pub fn resolve_with_report(settings: &BreakerSettings) -> (BreakerConfig, Vec<BreakerError>) {
    let mut defaulted = Vec::new();

    // Out-of-range values become 0 or usize::MAX and are replaced in `normalize`.
    let window_size = usize::try_from(settings.window_size)
        .unwrap_or(if settings.window_size < 0 { 0 } else { usize::MAX });

    let mut success_codes = Vec::with_capacity(settings.success_codes.len());
    for code in &settings.success_codes {
        match u16::try_from(*code).ok().and_then(|c| StatusCode::from_u16(c).ok()) {
            Some(status) => success_codes.push(status),
            None => defaulted.push(BreakerError::configuration_defaulted(
                "success_codes",
                format!("dropped invalid status code {}", code),
            )),
        }
    }

    let mut cooldown_schedule = Vec::with_capacity(settings.cooldown_schedule_ms.len());
    for ms in &settings.cooldown_schedule_ms {
        match u64::try_from(*ms) {
            Ok(ms) => cooldown_schedule.push(Duration::from_millis(ms)),
            Err(_) => defaulted.push(BreakerError::configuration_defaulted(
                "cooldown_schedule",
                format!("dropped negative cooldown {}ms", ms),
            )),
        }
    }

    let granularity = match settings.granularity.parse::<Granularity>() {
        Ok(granularity) => granularity,
        Err(reason) => {
            defaulted.push(BreakerError::configuration_defaulted(
                "granularity",
                format!("{}, using per_key", reason),
            ));
            Granularity::PerKey
        }
    };

    let (config, more) =
        BreakerConfig::normalize(window_size, success_codes, cooldown_schedule, granularity);
    defaulted.extend(more);
    (config, defaulted)
}
