//! Storage backends behind one interface.
//!
//! Exactly one backend is chosen at startup: the in-memory `MemoryBackend` defined
//! here, or a durable one living in its own crate.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{BackendError, ConfigError};
use crate::reading::{Measurement, Reading};
use crate::snapshot::{CurrentSnapshot, StoreSnapshot};
use crate::stats::RunningStats;
use crate::store::{ReadingStore, StoreConfig};

/// The latest snapshot of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    pub device_id: String,
    pub current: CurrentSnapshot,
}

pub trait ReadingBackend: Send + Sync {
    /// Short name used in logs and health output.
    fn name(&self) -> &'static str;

    /// The device this backend records readings for.
    fn device_id(&self) -> &str;

    fn record(&self, measurement: Measurement) -> Result<StoreSnapshot, BackendError>;

    /// The last `limit` readings, oldest first. `None` uses the backend's default limit.
    fn history(&self, limit: Option<usize>) -> Result<Vec<Reading>, BackendError>;

    fn current_snapshot(&self) -> Result<StoreSnapshot, BackendError>;

    fn stats(&self) -> Result<RunningStats, BackendError> {
        Ok(self.current_snapshot()?.stats)
    }

    fn clear(&self) -> Result<(), BackendError>;

    /// Runs one staleness check; returns the snapshot on a fresh transition to
    /// `disconnected`.
    fn mark_stale(&self, threshold: Duration) -> Result<Option<StoreSnapshot>, BackendError>;

    /// The latest snapshot of every device known to the backend.
    fn latest_per_device(&self) -> Result<Vec<DeviceSnapshot>, BackendError>;
}

/// A single `ReadingStore` behind one mutex.
#[derive(Debug)]
pub struct MemoryBackend {
    device_id: String,
    store: Mutex<ReadingStore>,
}

impl MemoryBackend {
    pub fn new(
        device_id: impl Into<String>,
        config: StoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            device_id: device_id.into(),
            store: Mutex::new(ReadingStore::new(config, clock)?),
        })
    }
}

impl ReadingBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn record(&self, measurement: Measurement) -> Result<StoreSnapshot, BackendError> {
        Ok(self.store.lock().record(measurement))
    }

    fn history(&self, limit: Option<usize>) -> Result<Vec<Reading>, BackendError> {
        Ok(self.store.lock().history(limit))
    }

    fn current_snapshot(&self) -> Result<StoreSnapshot, BackendError> {
        Ok(self.store.lock().current_snapshot())
    }

    fn stats(&self) -> Result<RunningStats, BackendError> {
        Ok(self.store.lock().stats())
    }

    fn clear(&self) -> Result<(), BackendError> {
        self.store.lock().clear();
        Ok(())
    }

    fn mark_stale(&self, threshold: Duration) -> Result<Option<StoreSnapshot>, BackendError> {
        Ok(self.store.lock().mark_stale(threshold))
    }

    fn latest_per_device(&self) -> Result<Vec<DeviceSnapshot>, BackendError> {
        let current = self.store.lock().current_snapshot().current;
        Ok(vec![DeviceSnapshot {
            device_id: self.device_id.clone(),
            current,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::snapshot::Status;

    fn memory_backend() -> (MemoryBackend, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let backend = MemoryBackend::new("esp32", StoreConfig::default(), clock.clone()).unwrap();
        (backend, clock)
    }

    #[test]
    fn memory_backend_round_trips_through_the_trait() {
        let (backend, _) = memory_backend();
        let backend: &dyn ReadingBackend = &backend;

        backend
            .record(Measurement::new(21.0, 45.0, Some(21.4)).unwrap())
            .unwrap();
        let snapshot = backend.current_snapshot().unwrap();
        assert_eq!(snapshot.current.status, Status::Active);
        assert_eq!(backend.stats().unwrap().total_readings, 1);
        assert_eq!(backend.history(None).unwrap().len(), 1);

        backend.clear().unwrap();
        assert!(backend.history(None).unwrap().is_empty());
        assert_eq!(backend.stats().unwrap().total_readings, 0);
        assert_eq!(backend.current_snapshot().unwrap().current, snapshot.current);
    }

    #[test]
    fn latest_per_device_reports_the_single_device() {
        let (backend, clock) = memory_backend();
        clock.set(90_000);
        backend.mark_stale(Duration::from_secs(60)).unwrap();

        let devices = backend.latest_per_device().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].device_id, "esp32");
        assert_eq!(devices[0].current.status, Status::Disconnected);
    }
}
