use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::resilience::{CircuitGuard, Granularity};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub granularity: Granularity,
    pub window_size: usize,
    pub tracked_keys: usize,
    pub open_circuits: usize,
}

#[derive(Debug, Serialize)]
pub struct BreakerStatus {
    pub key: String,
    pub open: bool,
    pub escalation_level: usize,
    pub failures_in_window: usize,
    pub history: Vec<bool>,
    pub idle_ms: u64,
    pub cooldown_remaining_ms: u64,
}

pub async fn get_status(State(guard): State<Arc<CircuitGuard>>) -> Json<SystemStatus> {
    let states = guard.store().snapshot();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        granularity: guard.config().granularity(),
        window_size: guard.config().window_size(),
        tracked_keys: states.len(),
        open_circuits: states.iter().filter(|s| s.is_open()).count(),
    })
}

pub async fn get_breakers(State(guard): State<Arc<CircuitGuard>>) -> Json<Vec<BreakerStatus>> {
    let statuses = guard
        .store()
        .snapshot()
        .into_iter()
        .map(|state| BreakerStatus {
            key: state.key().to_string(),
            open: state.is_open(),
            escalation_level: state.escalation_level(),
            failures_in_window: state.failures_in_window(),
            history: state.history(),
            idle_ms: state.last_activity().elapsed().as_millis() as u64,
            cooldown_remaining_ms: guard.remaining_cooldown(&state).as_millis() as u64,
        })
        .collect();

    Json(statuses)
}
