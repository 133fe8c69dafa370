use std::sync::Arc;

use climate_live::Monitor;

use crate::error::{ApiError, ApiResult};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    monitor: Arc<Monitor>,
    subscriber_buffer: usize,
}

impl AppState {
    pub fn new(monitor: Arc<Monitor>, subscriber_buffer: usize) -> Self {
        Self {
            monitor,
            subscriber_buffer: subscriber_buffer.max(1),
        }
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    pub fn subscriber_buffer(&self) -> usize {
        self.subscriber_buffer
    }

    /// Runs a monitor call on the blocking pool; the backend may do network I/O.
    pub async fn run<T, F>(&self, op: F) -> ApiResult<T>
    where
        F: FnOnce(&Monitor) -> ApiResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let monitor = self.monitor.clone();
        tokio::task::spawn_blocking(move || op(&monitor))
            .await
            .map_err(|err| ApiError::internal(err.to_string()))?
    }
}
