//! Bounded in-memory window of processed event keys

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// Default lifetime of a processed key
pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(3600);

/// How processed keys leave the window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpiryMode {
    /// Every sweep clears the whole window
    #[default]
    Wholesale,
    /// Each key expires `ttl` after it was recorded
    PerKey,
}

impl ExpiryMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "wholesale" | "clear" => Some(ExpiryMode::Wholesale),
            "per-key" | "perkey" | "per_key" => Some(ExpiryMode::PerKey),
            _ => None,
        }
    }
}

/// Outcome of trying to claim a key for publishing
#[derive(Debug)]
pub enum Reservation<'a> {
    /// The caller owns the key until the guard is committed or dropped
    Acquired(ReservationGuard<'a>),
    /// The key was already processed
    Processed,
    /// Another publish of the same key is running
    InFlight,
}

#[derive(Default)]
struct WindowState {
    processed: HashMap<String, Instant>,
    in_flight: HashSet<String>,
}

/// Time-bounded set of `name:eventId` keys.
///
/// A key is either processed, in flight, or absent. Sweeping never touches
/// in-flight keys, so a publish that straddles a sweep still records its key
/// when it completes.
pub struct DedupWindow {
    state: Mutex<WindowState>,
    ttl: Duration,
    mode: ExpiryMode,
}

impl DedupWindow {
    pub fn new(ttl: Duration, mode: ExpiryMode) -> Self {
        Self {
            state: Mutex::new(WindowState::default()),
            ttl,
            mode,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn mode(&self) -> ExpiryMode {
        self.mode
    }

    fn live(&self, recorded: Instant, now: Instant) -> bool {
        match self.mode {
            ExpiryMode::Wholesale => true,
            ExpiryMode::PerKey => now.saturating_duration_since(recorded) < self.ttl,
        }
    }

    fn processed_in(&self, state: &WindowState, key: &str, now: Instant) -> bool {
        state
            .processed
            .get(key)
            .is_some_and(|recorded| self.live(*recorded, now))
    }

    /// Whether `key` is recorded and not expired
    pub fn is_processed(&self, key: &str) -> bool {
        let now = Instant::now();
        self.processed_in(&self.state.lock(), key, now)
    }

    /// Whether `key` is processed or currently being published
    pub fn is_seen(&self, key: &str) -> bool {
        let now = Instant::now();
        let state = self.state.lock();
        state.in_flight.contains(key) || self.processed_in(&state, key, now)
    }

    /// Claim `key` for a publish.
    pub fn reserve(&self, key: &str) -> Reservation<'_> {
        let now = Instant::now();
        let mut state = self.state.lock();

        if self.processed_in(&state, key, now) {
            return Reservation::Processed;
        }
        if !state.in_flight.insert(key.to_string()) {
            return Reservation::InFlight;
        }

        Reservation::Acquired(ReservationGuard {
            window: self,
            key: key.to_string(),
            committed: false,
        })
    }

    /// Record `key` as processed directly
    pub fn record(&self, key: &str) {
        let mut state = self.state.lock();
        state.in_flight.remove(key);
        state.processed.insert(key.to_string(), Instant::now());
    }

    fn release(&self, key: &str) {
        self.state.lock().in_flight.remove(key);
    }

    /// Drop expired keys, returning how many were removed
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        let before = state.processed.len();
        match self.mode {
            ExpiryMode::Wholesale => state.processed.clear(),
            ExpiryMode::PerKey => state
                .processed
                .retain(|_, recorded| now.saturating_duration_since(*recorded) < self.ttl),
        }
        before - state.processed.len()
    }

    /// Number of processed keys held, expired or not
    pub fn len(&self) -> usize {
        self.state.lock().processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight.len()
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_TTL, ExpiryMode::default())
    }
}

/// Exclusive claim on a key. Dropping without [`ReservationGuard::commit`]
/// releases the key so a later publish can retry it.
pub struct ReservationGuard<'a> {
    window: &'a DedupWindow,
    key: String,
    committed: bool,
}

impl ReservationGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Mark the key processed
    pub fn commit(mut self) {
        self.window.record(&self.key);
        self.committed = true;
    }
}

impl Drop for ReservationGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.window.release(&self.key);
        }
    }
}

impl std::fmt::Debug for ReservationGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservationGuard")
            .field("key", &self.key)
            .field("committed", &self.committed)
            .finish()
    }
}
