use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

use crate::monitor::Monitor;

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(30);
pub const DEFAULT_THRESHOLD: Duration = Duration::from_secs(60);

/// Periodic staleness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watchdog {
    /// Time between checks.
    pub period: Duration,
    /// Idle time after which the sensor counts as disconnected.
    pub threshold: Duration,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl Watchdog {
    /// Runs the check loop until the returned handle is aborted.
    ///
    /// A failing check is logged and the loop carries on with the next tick.
    pub fn spawn(self, monitor: Arc<Monitor>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let monitor = monitor.clone();
                let threshold = self.threshold;
                match tokio::task::spawn_blocking(move || monitor.check_staleness(threshold)).await
                {
                    Ok(Ok(Some(report))) => debug!(
                        delivered = report.delivered,
                        dropped = report.dropped,
                        "disconnect broadcast"
                    ),
                    Ok(Ok(None)) => {}
                    Ok(Err(err)) => warn!(error = %err, "staleness check failed"),
                    Err(err) => error!(error = %err, "staleness check task failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::LiveMessage;
    use climate_core::{ManualClock, Measurement, MemoryBackend, Status, StoreConfig};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[tokio::test]
    async fn spawned_watchdog_fires_once() {
        let clock = Arc::new(ManualClock::new(0));
        let backend = MemoryBackend::new("esp32", StoreConfig::default(), clock.clone()).unwrap();
        let monitor = Arc::new(Monitor::new(Arc::new(backend)));
        monitor
            .ingest(Measurement::new(22.0, 50.0, None).unwrap())
            .unwrap();

        let (tx, mut rx) = mpsc::channel::<LiveMessage>(8);
        monitor.connect(Box::new(tx)).unwrap();
        assert!(matches!(rx.recv().await, Some(LiveMessage::Initial(_))));

        clock.advance(Duration::from_secs(61));
        let handle = Watchdog {
            period: Duration::from_millis(10),
            threshold: Duration::from_secs(60),
        }
        .spawn(monitor.clone());

        let message = timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.kind(), "update");
        assert_eq!(message.snapshot().current.status, Status::Disconnected);

        // Several more ticks pass without another disconnect message.
        assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());

        handle.abort();
    }
}
