//! Metrics collection and exposition.
//!
//! # Metrics
//! - `circuit_guard_admissions_total` (counter): admission decisions by `decision`
//! - `circuit_guard_outcomes_total` (counter): recorded outcomes by `outcome`
//! - `circuit_guard_transitions_total` (counter): open/close transitions by `transition`
//! - `circuit_guard_breaker_open` (gauge): 1=open, 0=closed, per `key`
//! - `circuit_guard_escalation_level` (gauge): current escalation level, per `key`
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::events::{BreakerEvent, EventKind, Transition};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Prometheus exporter listening");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter");
        }
    }
}

fn describe_metrics() {
    describe_counter!("circuit_guard_admissions_total", "Admission decisions");
    describe_counter!("circuit_guard_outcomes_total", "Recorded request outcomes");
    describe_counter!("circuit_guard_transitions_total", "Breaker state transitions");
    describe_gauge!("circuit_guard_breaker_open", "1 if the circuit for a key is open");
    describe_gauge!("circuit_guard_escalation_level", "Current cooldown escalation level");
}

pub fn record_event(event: &BreakerEvent) {
    match event.kind {
        EventKind::Admission { decision } => {
            counter!("circuit_guard_admissions_total", "decision" => decision.as_str())
                .increment(1);
        }
        EventKind::Outcome { outcome, transition } => {
            counter!("circuit_guard_outcomes_total", "outcome" => outcome.as_str()).increment(1);
            if transition != Transition::Unchanged {
                counter!("circuit_guard_transitions_total", "transition" => transition.as_str())
                    .increment(1);
                gauge!("circuit_guard_breaker_open", "key" => event.key.clone())
                    .set(if event.open { 1.0 } else { 0.0 });
                gauge!("circuit_guard_escalation_level", "key" => event.key.clone())
                    .set(event.escalation_level as f64);
            }
        }
    }
}
