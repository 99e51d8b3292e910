//! Per-key breaker state with a fixed-length outcome window.
//!
//! The window is oldest-first: index 0 is the oldest retained outcome, the
//! back of the deque is the newest. `true` is a success, `false` a failure.

use std::collections::VecDeque;

use tokio::time::Instant;

/// Breaker bookkeeping for one key (or the single global slot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerState {
    pub(crate) key: String,
    pub(crate) history: VecDeque<bool>,
    pub(crate) open: bool,
    pub(crate) escalation_level: usize,
    pub(crate) last_activity: Instant,
}

impl BreakerState {
    /// A fresh, closed state with an all-success window.
    pub fn new(key: impl Into<String>, window_size: usize, now: Instant) -> Self {
        Self {
            key: key.into(),
            history: std::iter::repeat(true).take(window_size).collect(),
            open: false,
            escalation_level: 0,
            last_activity: now,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Outcome window, oldest first.
    pub fn history(&self) -> Vec<bool> {
        self.history.iter().copied().collect()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn escalation_level(&self) -> usize {
        self.escalation_level
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn failures_in_window(&self) -> usize {
        self.history.iter().filter(|ok| !**ok).count()
    }

    /// Whether the state satisfies the invariants for the given configuration.
    pub fn is_consistent(&self, window_size: usize, schedule_len: usize) -> bool {
        self.history.len() == window_size
            && self.escalation_level < schedule_len.max(1)
            && (!self.open || self.history.iter().all(|ok| !ok))
    }

    /// Forget every recorded failure.
    pub(crate) fn fill_success(&mut self) {
        self.history.iter_mut().for_each(|slot| *slot = true);
    }

    /// Drop the oldest outcome and append a failure.
    ///
    /// Returns `true` when the whole window is now failures.
    pub(crate) fn push_failure(&mut self) -> bool {
        if self.history.pop_front().is_some() {
            self.history.push_back(false);
        }
        !self.history.is_empty() && self.history.iter().all(|ok| !ok)
    }
}
