//! Admission facade combining the store, the breaker and an event sink.
//!
//! Each admitted request holds a [`Permit`]. The permit records exactly one
//! outcome: the status passed to [`Permit::complete`], or a failure when it
//! is dropped unsettled (cancelled or timed-out request).

use std::sync::Arc;

use axum::http::StatusCode;
use tokio::time::Instant;

use crate::error::BreakerError;
use crate::observability::logging::TracingEventSink;
use crate::resilience::circuit_breaker::{Admission, BreakerConfig, SlidingWindowBreaker};
use crate::resilience::classifier::Outcome;
use crate::resilience::events::{BreakerEvent, EventSink};
use crate::resilience::store::WindowStore;
use crate::resilience::window::BreakerState;

pub struct CircuitGuard {
    breaker: SlidingWindowBreaker,
    store: WindowStore,
    sink: Arc<dyn EventSink>,
}

impl CircuitGuard {
    /// Guard that logs and counts events through `tracing` and `metrics`.
    pub fn new(config: BreakerConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingEventSink))
    }

    pub fn with_sink(config: BreakerConfig, sink: Arc<dyn EventSink>) -> Self {
        let store = WindowStore::new(
            config.granularity(),
            config.window_size(),
            config.cooldown_schedule().len(),
        );
        Self {
            breaker: SlidingWindowBreaker::new(config),
            store,
            sink,
        }
    }

    pub fn config(&self) -> &BreakerConfig {
        self.breaker.config()
    }

    pub fn store(&self) -> &WindowStore {
        &self.store
    }

    /// Remaining cooldown for a stored state, as of now.
    pub fn remaining_cooldown(&self, state: &BreakerState) -> std::time::Duration {
        self.breaker.remaining_cooldown(state, Instant::now())
    }

    /// Admission check for a request aimed at `target`.
    ///
    /// Returns [`BreakerError::CircuitOpen`] when the request must not be forwarded.
    pub fn try_admit(&self, target: &str) -> Result<Permit<'_>, BreakerError> {
        let key = self.store.key_for(target);
        let now = Instant::now();

        let (admission, event) = self.store.update(&key, now, |state| {
            let admission = self.breaker.admit(state, now);
            let event = BreakerEvent::admission(state, admission.decision());
            (admission, event)
        });
        self.sink.emit(&event);

        match admission {
            Admission::Admitted => Ok(Permit::new(self, key, false)),
            Admission::Probe => Ok(Permit::new(self, key, true)),
            Admission::Rejected { retry_after } => {
                Err(BreakerError::CircuitOpen { key, retry_after })
            }
        }
    }

    fn record(&self, key: &str, outcome: Outcome, probe: bool) {
        let now = Instant::now();
        let event = self.store.update(key, now, |state| {
            let transition = self.breaker.record(state, outcome, probe, now);
            BreakerEvent::outcome(state, outcome, transition)
        });
        self.sink.emit(&event);
    }
}

impl std::fmt::Debug for CircuitGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitGuard")
            .field("config", self.breaker.config())
            .field("tracked_keys", &self.store.len())
            .finish()
    }
}

/// Proof of admission for one request.
#[derive(Debug)]
#[must_use = "dropping a permit records a failure"]
pub struct Permit<'a> {
    guard: &'a CircuitGuard,
    key: String,
    probe: bool,
    settled: bool,
}

impl<'a> Permit<'a> {
    fn new(guard: &'a CircuitGuard, key: String, probe: bool) -> Self {
        Self {
            guard,
            key,
            probe,
            settled: false,
        }
    }

    /// Whether this request is the Half-Open trial.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// Record the final downstream status.
    pub fn complete(mut self, status: StatusCode) -> Outcome {
        let outcome = self.guard.config().classifier().classify(status);
        if outcome == Outcome::Failure {
            tracing::debug!(
                "{}",
                BreakerError::DownstreamFailure {
                    key: self.key.clone(),
                    status: Some(status),
                }
            );
        }
        self.settle(outcome);
        outcome
    }

    /// Record a failure without a status (transport error, cancellation).
    pub fn fail(mut self) {
        self.settle(Outcome::Failure);
    }

    fn settle(&mut self, outcome: Outcome) {
        if self.settled {
            return;
        }
        self.settled = true;
        self.guard.record(&self.key, outcome, self.probe);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(
                "{}",
                BreakerError::DownstreamFailure {
                    key: self.key.clone(),
                    status: None,
                }
            );
            self.settle(Outcome::Failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::events::{Decision, EventKind, Transition};
    use crate::resilience::store::{Granularity, GLOBAL_KEY};
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<BreakerEvent>>,
    }

    impl EventSink for Recorder {
        fn emit(&self, event: &BreakerEvent) {
            self.events.lock().push(event.clone());
        }
    }

    fn guard(
        window_size: usize,
        cooldown: Duration,
        granularity: Granularity,
    ) -> (CircuitGuard, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let config =
            BreakerConfig::new(window_size, [StatusCode::OK], vec![cooldown], granularity);
        (CircuitGuard::with_sink(config, recorder.clone()), recorder)
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_records_status() {
        let (guard, recorder) = guard(2, Duration::from_secs(3), Granularity::PerKey);

        for _ in 0..2 {
            let permit = guard.try_admit("/a").unwrap();
            assert_eq!(permit.complete(StatusCode::BAD_GATEWAY), Outcome::Failure);
        }

        let err = guard.try_admit("/a").unwrap_err();
        assert_eq!(
            err,
            BreakerError::CircuitOpen {
                key: "/a".into(),
                retry_after: Duration::from_secs(3)
            }
        );

        let events = recorder.events.lock();
        let last_outcome = events
            .iter()
            .rev()
            .find(|e| matches!(e.kind, EventKind::Outcome { .. }))
            .unwrap();
        assert_eq!(
            last_outcome.kind,
            EventKind::Outcome {
                outcome: Outcome::Failure,
                transition: Transition::Tripped
            }
        );
        assert_eq!(
            events.last().unwrap().kind,
            EventKind::Admission {
                decision: Decision::Rejected
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_permit_counts_as_failure() {
        let (guard, _) = guard(1, Duration::from_secs(3), Granularity::PerKey);

        drop(guard.try_admit("/slow").unwrap());

        assert!(guard.store().get("/slow").unwrap().is_open());
        assert!(guard.try_admit("/slow").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_after_cooldown() {
        let (guard, _) = guard(1, Duration::from_secs(3), Granularity::PerKey);
        guard.try_admit("/a").unwrap().fail();

        tokio::time::advance(Duration::from_millis(3001)).await;
        let probe = guard.try_admit("/a").unwrap();
        assert!(probe.is_probe());
        assert!(guard.try_admit("/a").is_err());

        probe.complete(StatusCode::OK);
        let permit = guard.try_admit("/a").unwrap();
        assert!(!permit.is_probe());
        permit.complete(StatusCode::OK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_granularity_shares_state_across_targets() {
        let (guard, _) = guard(2, Duration::from_secs(3), Granularity::Global);

        guard.try_admit("/a").unwrap().complete(StatusCode::INTERNAL_SERVER_ERROR);
        guard.try_admit("/b").unwrap().complete(StatusCode::INTERNAL_SERVER_ERROR);

        let err = guard.try_admit("/c").unwrap_err();
        assert!(matches!(err, BreakerError::CircuitOpen { ref key, .. } if key == GLOBAL_KEY));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_probe_under_concurrent_load() {
        let (guard, _) = guard(1, Duration::from_secs(3), Granularity::PerKey);
        guard.try_admit("/a").unwrap().fail();
        tokio::time::advance(Duration::from_millis(3001)).await;

        // Worker threads enter the runtime so they read the same frozen clock.
        let handle = tokio::runtime::Handle::current();
        let barrier = std::sync::Barrier::new(16);
        let admitted = std::sync::atomic::AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    let _runtime = handle.enter();
                    barrier.wait();
                    if let Ok(permit) = guard.try_admit("/a") {
                        assert!(permit.is_probe());
                        admitted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        permit.fail();
                    }
                });
            }
        });

        assert_eq!(admitted.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(guard.store().get("/a").unwrap().escalation_level(), 0);
    }
}
