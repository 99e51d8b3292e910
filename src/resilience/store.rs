//! Keyed store of breaker state.
//!
//! # Design Decisions
//! - One `Arc<Mutex<BreakerState>>` slot per key; the map only hands out slots
//! - Slot creation goes through `DashMap::entry`, so concurrent first access
//!   for the same key always yields the same slot
//! - Read-modify-write happens under the slot mutex only, never across the
//!   downstream call
//! - Global granularity is a single lazily created slot, no map at all
//! - Entries are never evicted

use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use crate::error::BreakerError;
use crate::resilience::window::BreakerState;

/// Key used for the shared slot under [`Granularity::Global`].
pub const GLOBAL_KEY: &str = "*";

/// How request targets map onto breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One state per distinct request target.
    #[default]
    PerKey,
    /// One state shared by all traffic.
    Global,
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_key" | "per-key" | "perkey" | "endpoint" => Ok(Granularity::PerKey),
            "global" | "router" => Ok(Granularity::Global),
            other => Err(format!("unknown granularity `{}`", other)),
        }
    }
}

type Slot = Arc<Mutex<BreakerState>>;

#[derive(Debug)]
enum Slots {
    PerKey(DashMap<String, Slot>),
    Global(OnceLock<Slot>),
}

/// Concurrency-safe store of [`BreakerState`] keyed by request target.
#[derive(Debug)]
pub struct WindowStore {
    window_size: usize,
    schedule_len: usize,
    slots: Slots,
}

impl WindowStore {
    pub fn new(granularity: Granularity, window_size: usize, schedule_len: usize) -> Self {
        let slots = match granularity {
            Granularity::PerKey => Slots::PerKey(DashMap::new()),
            Granularity::Global => Slots::Global(OnceLock::new()),
        };
        Self {
            window_size,
            schedule_len,
            slots,
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self.slots {
            Slots::PerKey(_) => Granularity::PerKey,
            Slots::Global(_) => Granularity::Global,
        }
    }

    /// Map a request target onto its store key.
    pub fn key_for(&self, target: &str) -> String {
        match self.slots {
            Slots::PerKey(_) => target.to_string(),
            Slots::Global(_) => GLOBAL_KEY.to_string(),
        }
    }

    /// Return the state for `key`, creating a fresh closed one if absent.
    pub fn get_or_create(&self, key: &str, now: Instant) -> BreakerState {
        self.update(key, now, |state| state.clone())
    }

    /// Current state for `key`, if one has been created.
    pub fn get(&self, key: &str) -> Option<BreakerState> {
        let slot = self.existing_slot(key)?;
        let mut state = slot.lock();
        self.repair(&mut state, Instant::now());
        Some(state.clone())
    }

    /// Persist `state` under `key`.
    pub fn put(&self, key: &str, state: BreakerState) {
        let slot = self.slot(key, state.last_activity);
        *slot.lock() = state;
    }

    /// Run `f` against the state for `key` inside its exclusive section.
    ///
    /// The state is created first if absent and re-initialised if it fails
    /// its invariants. `f` must not block.
    pub fn update<R>(
        &self,
        key: &str,
        now: Instant,
        f: impl FnOnce(&mut BreakerState) -> R,
    ) -> R {
        let slot = self.slot(key, now);
        let mut state = slot.lock();
        self.repair(&mut state, now);
        f(&mut state)
    }

    /// Snapshot of every tracked state, ordered by key.
    pub fn snapshot(&self) -> Vec<BreakerState> {
        let mut states: Vec<BreakerState> = match &self.slots {
            Slots::PerKey(map) => map.iter().map(|entry| entry.value().lock().clone()).collect(),
            Slots::Global(cell) => cell
                .get()
                .map(|slot| slot.lock().clone())
                .into_iter()
                .collect(),
        };
        states.sort_by(|a, b| a.key.cmp(&b.key));
        states
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        match &self.slots {
            Slots::PerKey(map) => map.len(),
            Slots::Global(cell) => usize::from(cell.get().is_some()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn existing_slot(&self, key: &str) -> Option<Slot> {
        match &self.slots {
            Slots::PerKey(map) => map.get(key).map(|entry| entry.value().clone()),
            Slots::Global(cell) => cell.get().cloned(),
        }
    }

    fn slot(&self, key: &str, now: Instant) -> Slot {
        match &self.slots {
            Slots::PerKey(map) => {
                if let Some(entry) = map.get(key) {
                    return entry.value().clone();
                }
                map.entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(self.fresh(key, now))))
                    .value()
                    .clone()
            }
            Slots::Global(cell) => cell
                .get_or_init(|| Arc::new(Mutex::new(self.fresh(GLOBAL_KEY, now))))
                .clone(),
        }
    }

    fn fresh(&self, key: &str, now: Instant) -> BreakerState {
        tracing::debug!(key = %key, window_size = self.window_size, "Tracking new breaker key");
        BreakerState::new(key, self.window_size, now)
    }

    fn repair(&self, state: &mut BreakerState, now: Instant) {
        if state.is_consistent(self.window_size, self.schedule_len) {
            return;
        }
        let error = BreakerError::StoreCorruption {
            key: state.key.clone(),
        };
        tracing::warn!(
            key = %state.key,
            history_len = state.history.len(),
            expected_len = self.window_size,
            escalation_level = state.escalation_level,
            "{}",
            error
        );
        *state = BreakerState::new(state.key.clone(), self.window_size, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_get_or_create_initialises_closed_state() {
        let store = WindowStore::new(Granularity::PerKey, 3, 1);
        let now = Instant::now();

        let state = store.get_or_create("/users", now);
        assert_eq!(state.key(), "/users");
        assert_eq!(state.history(), vec![true, true, true]);
        assert!(!state.is_open());
        assert_eq!(state.last_activity(), now);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_put_then_get_round_trips() {
        let store = WindowStore::new(Granularity::PerKey, 3, 2);
        let now = Instant::now();

        let mut state = store.get_or_create("/users", now);
        state.push_failure();
        state.push_failure();
        state.push_failure();
        state.open = true;
        state.escalation_level = 1;
        state.last_activity = now + Duration::from_secs(2);
        store.put("/users", state.clone());

        assert_eq!(store.get("/users"), Some(state.clone()));
        assert_eq!(store.get_or_create("/users", now), state);
    }

    #[test]
    fn test_keys_are_independent() {
        let store = WindowStore::new(Granularity::PerKey, 2, 1);
        let now = Instant::now();

        store.update("/a", now, |state| {
            state.push_failure();
        });

        assert_eq!(store.get_or_create("/a", now).failures_in_window(), 1);
        assert_eq!(store.get_or_create("/b", now).failures_in_window(), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_global_granularity_shares_one_slot() {
        let store = WindowStore::new(Granularity::Global, 2, 1);
        let now = Instant::now();

        assert_eq!(store.key_for("/a"), GLOBAL_KEY);
        assert_eq!(store.key_for("/b"), GLOBAL_KEY);
        assert!(store.is_empty());

        store.update(&store.key_for("/a"), now, |state| {
            state.push_failure();
        });
        let seen_from_b = store.get_or_create(&store.key_for("/b"), now);
        assert_eq!(seen_from_b.failures_in_window(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_corrupted_state_is_reinitialised() {
        let store = WindowStore::new(Granularity::PerKey, 3, 1);
        let now = Instant::now();

        let mut broken = BreakerState::new("/x", 5, now);
        broken.open = true;
        store.put("/x", broken);

        let repaired = store.get_or_create("/x", now);
        assert_eq!(repaired.history(), vec![true, true, true]);
        assert!(!repaired.is_open());
    }

    #[test]
    fn test_concurrent_first_access_creates_one_state() {
        let store = Arc::new(WindowStore::new(Granularity::PerKey, 4, 1));
        let now = Instant::now();

        std::thread::scope(|scope| {
            for _ in 0..16 {
                let store = store.clone();
                scope.spawn(move || {
                    store.update("/hot", now, |state| {
                        state.push_failure();
                    });
                });
            }
        });

        assert_eq!(store.len(), 1);
        let state = store.get_or_create("/hot", now);
        assert_eq!(state.failures_in_window(), 4);
        assert_eq!(state.history().len(), 4);
    }

    #[test]
    fn test_granularity_parsing() {
        assert_eq!("per_key".parse::<Granularity>(), Ok(Granularity::PerKey));
        assert_eq!("Global".parse::<Granularity>(), Ok(Granularity::Global));
        assert!("cluster".parse::<Granularity>().is_err());
    }
}
