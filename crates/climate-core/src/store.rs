//! The in-memory reading store: current slot, bounded history and running stats.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::ConfigError;
use crate::history::HistoryBuffer;
use crate::reading::{Measurement, Reading};
use crate::snapshot::{CurrentSnapshot, StoreSnapshot};
use crate::stats::RunningStats;

pub const DEFAULT_CAPACITY: usize = 100;
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Maximum number of readings kept in history.
    pub capacity: usize,
    /// Number of readings returned by `history(None)`.
    pub default_history_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl StoreConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }
}

/// State for one sensor stream.
///
/// Not synchronized on its own; callers share it behind a single lock
/// (see [`crate::MemoryBackend`]).
#[derive(Debug)]
pub struct ReadingStore {
    clock: Arc<dyn Clock>,
    history: HistoryBuffer,
    current: CurrentSnapshot,
    stats: RunningStats,
    next_sequence: u64,
    default_history_limit: usize,
}

impl ReadingStore {
    pub fn new(config: StoreConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let history = HistoryBuffer::new(config.capacity)?;
        let current = CurrentSnapshot::waiting(clock.now_ms());
        Ok(Self {
            clock,
            history,
            current,
            stats: RunningStats::default(),
            next_sequence: 1,
            default_history_limit: config.default_history_limit,
        })
    }

    /// Stamps and stores a measurement, then returns the resulting snapshot.
    ///
    /// Always leaves the store `active`, including after a watchdog disconnect.
    pub fn record(&mut self, measurement: Measurement) -> StoreSnapshot {
        let reading = measurement.stamp(self.clock.now_ms(), self.next_sequence);
        self.next_sequence += 1;

        self.current = CurrentSnapshot::active(reading);
        self.history.push(reading);
        self.stats.observe(&reading);
        self.stats.average_over(self.history.iter());

        self.current_snapshot()
    }

    /// The last `limit` readings (default limit when `None`), oldest first.
    pub fn history(&self, limit: Option<usize>) -> Vec<Reading> {
        self.history
            .latest(limit.unwrap_or(self.default_history_limit))
    }

    pub fn current_snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            current: self.current,
            stats: self.stats,
        }
    }

    pub fn stats(&self) -> RunningStats {
        self.stats
    }

    /// Empties the history and resets the statistics and sequence ids.
    ///
    /// The current reading and its timestamp are kept.
    pub fn clear(&mut self) {
        self.history.clear();
        self.stats = RunningStats::default();
        self.next_sequence = 1;
    }

    /// One watchdog check. Returns the new snapshot when the store has just become
    /// disconnected.
    pub fn mark_stale(&mut self, threshold: Duration) -> Option<StoreSnapshot> {
        let stale = self
            .current
            .stale_transition(self.clock.now_ms(), threshold)?;
        self.current = stale;
        Some(self.current_snapshot())
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.history.capacity()
    }
}
