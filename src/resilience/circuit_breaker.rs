//! Sliding-window circuit breaker.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: target assumed down, requests fail fast
//! - Half-Open: one trial request let through once the cooldown has elapsed
//!
//! # State Transitions
//! ```text
//! Closed → Open:      the last `window_size` outcomes are all failures
//! Open → Half-Open:   now - last_activity > cooldown_schedule[escalation_level]
//! Half-Open → Closed: probe succeeds (escalation reset to 0)
//! Half-Open → Open:   probe fails (escalation + 1, clamped)
//! ```
//!
//! # Design Decisions
//! - Half-Open is decided at admission time, it is never stored
//! - The probe refreshes `last_activity` before forwarding, so requests
//!   arriving in the same instant are rejected
//! - Any recorded success closes the circuit and wipes the window

use std::time::Duration;

use axum::http::StatusCode;
use tokio::time::Instant;

use crate::error::BreakerError;
use crate::resilience::classifier::{Outcome, OutcomeClassifier};
use crate::resilience::events::{Decision, Transition};
use crate::resilience::store::Granularity;
use crate::resilience::window::BreakerState;

pub const DEFAULT_WINDOW_SIZE: usize = 3;
/// Largest accepted window; every key allocates one slot per entry.
pub const MAX_WINDOW_SIZE: usize = 1024;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(1);

/// Immutable breaker configuration shared by every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    window_size: usize,
    classifier: OutcomeClassifier,
    cooldown_schedule: Vec<Duration>,
    granularity: Granularity,
}

impl BreakerConfig {
    /// Build a configuration, logging a warning for every defaulted field.
    pub fn new(
        window_size: usize,
        success_codes: impl IntoIterator<Item = StatusCode>,
        cooldown_schedule: Vec<Duration>,
        granularity: Granularity,
    ) -> Self {
        let (config, defaulted) =
            Self::normalize(window_size, success_codes, cooldown_schedule, granularity);
        for error in &defaulted {
            tracing::warn!("{}", error);
        }
        config
    }

    /// Apply fallbacks and report which fields were replaced.
    pub fn normalize(
        window_size: usize,
        success_codes: impl IntoIterator<Item = StatusCode>,
        cooldown_schedule: Vec<Duration>,
        granularity: Granularity,
    ) -> (Self, Vec<BreakerError>) {
        let mut defaulted = Vec::new();

        let window_size = if window_size == 0 || window_size > MAX_WINDOW_SIZE {
            defaulted.push(BreakerError::configuration_defaulted(
                "window_size",
                format!(
                    "must be between 1 and {}, using {}",
                    MAX_WINDOW_SIZE, DEFAULT_WINDOW_SIZE
                ),
            ));
            DEFAULT_WINDOW_SIZE
        } else {
            window_size
        };

        let success_codes: Vec<StatusCode> = success_codes.into_iter().collect();
        if success_codes.is_empty() {
            defaulted.push(BreakerError::configuration_defaulted(
                "success_codes",
                "empty, using {200}",
            ));
        }
        let classifier = OutcomeClassifier::new(success_codes);

        let cooldown_schedule = if cooldown_schedule.is_empty() {
            defaulted.push(BreakerError::configuration_defaulted(
                "cooldown_schedule",
                format!("empty, using [{:?}]", DEFAULT_COOLDOWN),
            ));
            vec![DEFAULT_COOLDOWN]
        } else {
            cooldown_schedule
        };

        let config = Self {
            window_size,
            classifier,
            cooldown_schedule,
            granularity,
        };
        (config, defaulted)
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn classifier(&self) -> &OutcomeClassifier {
        &self.classifier
    }

    pub fn cooldown_schedule(&self) -> &[Duration] {
        &self.cooldown_schedule
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Highest valid escalation level.
    pub fn max_escalation_level(&self) -> usize {
        self.cooldown_schedule.len().saturating_sub(1)
    }

    /// Cooldown for `level`, clamped to the last schedule entry.
    pub fn cooldown(&self, level: usize) -> Duration {
        let index = level.min(self.max_escalation_level());
        self.cooldown_schedule
            .get(index)
            .copied()
            .unwrap_or(DEFAULT_COOLDOWN)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            classifier: OutcomeClassifier::default(),
            cooldown_schedule: vec![DEFAULT_COOLDOWN],
            granularity: Granularity::PerKey,
        }
    }
}

/// Admission verdict for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Probe,
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn decision(&self) -> Decision {
        match self {
            Admission::Admitted => Decision::Admitted,
            Admission::Probe => Decision::Probe,
            Admission::Rejected { .. } => Decision::Rejected,
        }
    }

    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::Rejected { .. })
    }
}

/// The breaker state machine. Stateless itself; operates on a [`BreakerState`]
/// that the caller holds exclusively.
#[derive(Debug, Clone, Default)]
pub struct SlidingWindowBreaker {
    config: BreakerConfig,
}

impl SlidingWindowBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Decide whether a request may proceed, updating `last_activity` when it does.
    pub fn admit(&self, state: &mut BreakerState, now: Instant) -> Admission {
        if !state.open {
            state.last_activity = now;
            return Admission::Admitted;
        }

        let cooldown = self.config.cooldown(state.escalation_level);
        let elapsed = now.saturating_duration_since(state.last_activity);
        if elapsed > cooldown {
            state.last_activity = now;
            Admission::Probe
        } else {
            Admission::Rejected {
                retry_after: cooldown - elapsed,
            }
        }
    }

    /// Time left before the next probe may be admitted; zero when closed or due.
    pub fn remaining_cooldown(&self, state: &BreakerState, now: Instant) -> Duration {
        if !state.open {
            return Duration::ZERO;
        }
        let cooldown = self.config.cooldown(state.escalation_level);
        cooldown.saturating_sub(now.saturating_duration_since(state.last_activity))
    }

    /// Fold one outcome into `state`.
    ///
    /// `probe` marks the outcome of a Half-Open trial; only a failed probe
    /// escalates the cooldown.
    pub fn record(
        &self,
        state: &mut BreakerState,
        outcome: Outcome,
        probe: bool,
        now: Instant,
    ) -> Transition {
        match outcome {
            Outcome::Success => {
                let was_open = state.open;
                state.fill_success();
                state.open = false;
                state.escalation_level = 0;
                if was_open {
                    Transition::Closed
                } else {
                    Transition::Unchanged
                }
            }
            Outcome::Failure => {
                if !state.push_failure() {
                    return Transition::Unchanged;
                }
                let was_open = state.open;
                state.open = true;
                state.last_activity = now;
                match (was_open, probe) {
                    (false, _) => Transition::Tripped,
                    (true, true) => {
                        state.escalation_level =
                            (state.escalation_level + 1).min(self.config.max_escalation_level());
                        Transition::Escalated {
                            level: state.escalation_level,
                        }
                    }
                    // Late failure of a request admitted before the trip.
                    (true, false) => Transition::Unchanged,
                }
            }
        }
    }
}
