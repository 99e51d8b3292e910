//! Structured breaker events.
//!
//! The breaker produces these as plain data; an [`EventSink`] decides what to
//! do with them (log, count, collect in tests).

use serde::Serialize;

use crate::resilience::classifier::Outcome;
use crate::resilience::window::BreakerState;

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Circuit closed, forwarded normally.
    Admitted,
    /// Circuit open but cooldown elapsed; forwarded as the single trial request.
    Probe,
    /// Circuit open, not forwarded.
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Admitted => "admitted",
            Decision::Probe => "probe",
            Decision::Rejected => "rejected",
        }
    }
}

/// State change caused by recording one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Open/closed flag unchanged.
    Unchanged,
    /// Closed to open after a full window of failures.
    Tripped,
    /// A failed probe kept the circuit open at the given level.
    Escalated { level: usize },
    /// Open to closed after a recorded success.
    Closed,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Unchanged => "unchanged",
            Transition::Tripped => "tripped",
            Transition::Escalated { .. } => "escalated",
            Transition::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Admission { decision: Decision },
    Outcome { outcome: Outcome, transition: Transition },
}

/// One admission decision or outcome, with the state it left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerEvent {
    pub key: String,
    pub kind: EventKind,
    pub open: bool,
    pub escalation_level: usize,
    pub failures_in_window: usize,
}

impl BreakerEvent {
    pub fn admission(state: &BreakerState, decision: Decision) -> Self {
        Self::from_state(state, EventKind::Admission { decision })
    }

    pub fn outcome(state: &BreakerState, outcome: Outcome, transition: Transition) -> Self {
        Self::from_state(state, EventKind::Outcome { outcome, transition })
    }

    fn from_state(state: &BreakerState, kind: EventKind) -> Self {
        Self {
            key: state.key().to_string(),
            kind,
            open: state.is_open(),
            escalation_level: state.escalation_level(),
            failures_in_window: state.failures_in_window(),
        }
    }
}

/// Consumer of breaker events.
///
/// Called after the state's exclusive section has been released, so
/// implementations may block briefly but should not call back into the guard.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &BreakerEvent);
}
