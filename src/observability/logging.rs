//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Turn breaker events into log lines and metrics
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - JSON format for production, pretty format for development

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, ObservabilityConfig};
use crate::resilience::events::{BreakerEvent, Decision, EventKind, EventSink, Transition};

/// Install the global subscriber. Call once at startup.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "circuit_guard={level},tower_http={level}",
            level = config.log_level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Default event sink: one log line per event plus metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &BreakerEvent) {
        crate::observability::metrics::record_event(event);

        match event.kind {
            EventKind::Admission { decision: Decision::Admitted } => {
                tracing::trace!(key = %event.key, "Request admitted");
            }
            EventKind::Admission { decision: Decision::Probe } => {
                tracing::info!(
                    key = %event.key,
                    escalation_level = event.escalation_level,
                    "Cooldown elapsed, admitting probe request"
                );
            }
            EventKind::Admission { decision: Decision::Rejected } => {
                tracing::debug!(
                    key = %event.key,
                    escalation_level = event.escalation_level,
                    "Circuit open, request rejected"
                );
            }
            EventKind::Outcome { outcome, transition } => match transition {
                Transition::Tripped => tracing::warn!(
                    key = %event.key,
                    failures = event.failures_in_window,
                    "Circuit opened"
                ),
                Transition::Escalated { level } => tracing::warn!(
                    key = %event.key,
                    escalation_level = level,
                    "Probe failed, circuit stays open"
                ),
                Transition::Closed => tracing::info!(key = %event.key, "Circuit closed"),
                Transition::Unchanged => tracing::trace!(
                    key = %event.key,
                    outcome = outcome.as_str(),
                    open = event.open,
                    failures = event.failures_in_window,
                    "Outcome recorded"
                ),
            },
        }
    }
}
