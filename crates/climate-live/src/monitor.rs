//! Ingestion path: record, then broadcast, under one gate.

use std::sync::Arc;
use std::time::Duration;

use climate_core::{BackendError, Measurement, ReadingBackend, StoreSnapshot};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use crate::distributor::{BroadcastReport, DeliveryError, LiveDistributor, Subscriber, SubscriberId};

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Owns the selected backend and the live subscriber set.
///
/// Every write (`ingest`, `clear`, `check_staleness`) and every new connection holds
/// the same gate, so broadcasts leave in the order the backend applied them and a
/// subscriber cannot miss an update between its initial snapshot and registration.
/// Calls may block on backend I/O; async callers should use `spawn_blocking`.
pub struct Monitor {
    backend: Arc<dyn ReadingBackend>,
    distributor: LiveDistributor,
    gate: Mutex<()>,
}

impl Monitor {
    pub fn new(backend: Arc<dyn ReadingBackend>) -> Self {
        Self {
            backend,
            distributor: LiveDistributor::new(),
            gate: Mutex::new(()),
        }
    }

    /// Read access to the backend. Reads have no side effects and need no gate.
    pub fn backend(&self) -> &dyn ReadingBackend {
        self.backend.as_ref()
    }

    pub fn distributor(&self) -> &LiveDistributor {
        &self.distributor
    }

    pub fn ingest(&self, measurement: Measurement) -> Result<StoreSnapshot, BackendError> {
        let _gate = self.gate.lock();
        let snapshot = self.backend.record(measurement)?;
        let report = self.distributor.broadcast(&snapshot);
        info!(
            temperature = measurement.temperature(),
            humidity = measurement.humidity(),
            delivered = report.delivered,
            dropped = report.dropped,
            "reading recorded"
        );
        Ok(snapshot)
    }

    pub fn clear(&self) -> Result<(), BackendError> {
        let _gate = self.gate.lock();
        self.backend.clear()?;
        info!(backend = self.backend.name(), "history and stats cleared");
        Ok(())
    }

    pub fn connect(&self, subscriber: Box<dyn Subscriber>) -> Result<SubscriberId, ConnectError> {
        let _gate = self.gate.lock();
        let initial = self.backend.current_snapshot()?;
        let id = self.distributor.subscribe(subscriber, initial)?;
        info!(subscriber = %id, open = self.distributor.len(), "live subscriber connected");
        Ok(id)
    }

    pub fn disconnect(&self, id: SubscriberId) {
        if self.distributor.unsubscribe(id) {
            info!(subscriber = %id, open = self.distributor.len(), "live subscriber disconnected");
        }
    }

    /// One watchdog tick. Broadcasts and returns the report only when the sensor has
    /// just crossed `threshold`.
    pub fn check_staleness(
        &self,
        threshold: Duration,
    ) -> Result<Option<BroadcastReport>, BackendError> {
        let _gate = self.gate.lock();
        let Some(snapshot) = self.backend.mark_stale(threshold)? else {
            return Ok(None);
        };
        warn!(
            device = self.backend.device_id(),
            last_seen = snapshot.current.last_seen,
            "no data from sensor, marking disconnected"
        );
        Ok(Some(self.distributor.broadcast(&snapshot)))
    }
}
