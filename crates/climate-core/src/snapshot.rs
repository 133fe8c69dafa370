use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::reading::Reading;
use crate::stats::RunningStats;

/// Connectivity of the sensor as seen from the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Nothing recorded yet.
    #[default]
    Waiting,
    Active,
    /// Set by the staleness watchdog only.
    Disconnected,
}

/// The most recent reading plus its status tag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSnapshot {
    pub status: Status,
    pub reading: Option<Reading>,
    /// Timestamp of `reading`, or when the store was created while still waiting.
    pub last_seen: i64,
}

impl CurrentSnapshot {
    pub fn waiting(since: i64) -> Self {
        Self {
            status: Status::Waiting,
            reading: None,
            last_seen: since,
        }
    }

    pub fn active(reading: Reading) -> Self {
        Self {
            status: Status::Active,
            reading: Some(reading),
            last_seen: reading.timestamp,
        }
    }

    pub fn idle_ms(&self, now: i64) -> i64 {
        now.saturating_sub(self.last_seen)
    }

    /// The `disconnected` copy of this snapshot if it has been idle for longer than
    /// `threshold` and is not already disconnected.
    ///
    /// Edge-triggered: once disconnected this returns `None` until a new reading
    /// makes the snapshot active again.
    pub fn stale_transition(&self, now: i64, threshold: Duration) -> Option<Self> {
        if self.status == Status::Disconnected {
            return None;
        }
        let threshold_ms = i64::try_from(threshold.as_millis()).unwrap_or(i64::MAX);
        (self.idle_ms(now) > threshold_ms).then_some(Self {
            status: Status::Disconnected,
            ..*self
        })
    }
}

/// Current snapshot together with the running statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub current: CurrentSnapshot,
    pub stats: RunningStats,
}
