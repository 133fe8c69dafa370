//! # Climate Redis
//!
//! This crate stores readings in Redis and exposes them through the
//! `ReadingBackend` trait, so it can replace the in-memory store.
//! Values are stored as JSON; every device gets its own set of keys.
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use climate_core::{
    BackendError, Clock, ConfigError, CurrentSnapshot, DeviceSnapshot, Measurement,
    ReadingBackend, Reading, RunningStats, StoreSnapshot, DEFAULT_CAPACITY,
    DEFAULT_HISTORY_LIMIT,
};
use parking_lot::Mutex;
use redis::{Client, Commands, Connection};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

const BACKEND: &str = "redis";

pub const DEVICES_KEY: &str = "climate:devices";
/// Optimistic retries of `record` when another writer touches the same device.
const MAX_RECORD_ATTEMPTS: usize = 10;
pub const DEFAULT_RETENTION: usize = 10_000;

// --- Key Builders ---

pub fn readings_key(device_id: &str) -> String {
    format!("climate:dev:{}:readings", device_id)
}

pub fn latest_key(device_id: &str) -> String {
    format!("climate:dev:{}:latest", device_id)
}

pub fn stats_key(device_id: &str) -> String {
    format!("climate:dev:{}:stats", device_id)
}

pub fn sequence_key(device_id: &str) -> String {
    format!("climate:dev:{}:seq", device_id)
}

// --- Generic I/O Helpers ---

fn write_struct<T: Serialize>(con: &mut Connection, key: &str, value: &T) -> Result<()> {
    let json_string = serde_json::to_string(value)?;
    con.set::<_, _, ()>(key, json_string)?;
    Ok(())
}

fn read_struct<T: DeserializeOwned>(con: &mut Connection, key: &str) -> Result<Option<T>> {
    let json_string: Option<String> = con.get(key)?;
    json_string
        .map(|s| serde_json::from_str(&s).map_err(Into::into))
        .transpose()
}

/// The last `count` entries of a JSON list, oldest first.
fn read_tail<T: DeserializeOwned>(con: &mut Connection, key: &str, count: usize) -> Result<Vec<T>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let start = -isize::try_from(count).unwrap_or(isize::MAX);
    let values: Vec<String> = con.lrange(key, start, -1)?;
    values
        .iter()
        .map(|val| serde_json::from_str(val).map_err(Into::into))
        .collect()
}

/// Applies a new reading to the stored statistics. `window` holds the readings
/// that stay inside the averaging window, oldest first.
fn fold_reading(mut stats: RunningStats, mut window: Vec<Reading>, reading: Reading) -> StoreSnapshot {
    window.push(reading);
    stats.observe(&reading);
    stats.average_over(&window);
    StoreSnapshot {
        current: CurrentSnapshot::active(reading),
        stats,
    }
}

// --- Backend ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisOptions {
    pub device_id: String,
    /// Number of most recent readings the averages are computed over.
    pub capacity: usize,
    /// Number of readings kept in the list before the oldest are trimmed. Deliberately
    /// larger than `capacity`, so history and exports may return more than the averages cover.
    pub retention: usize,
    pub default_history_limit: usize,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            device_id: "esp32".to_string(),
            capacity: DEFAULT_CAPACITY,
            retention: DEFAULT_RETENTION,
            default_history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

struct Session {
    client: Client,
    con: Mutex<Option<Connection>>,
    clock: Arc<dyn Clock>,
    started_at: i64,
}

enum Link {
    Unconfigured(String),
    Connected(Session),
}

/// Durable backend for one device.
///
/// When built with [`RedisBackend::unconfigured`] every call fails with
/// `BackendError::Unavailable` instead of panicking.
pub struct RedisBackend {
    options: RedisOptions,
    link: Link,
}

impl RedisBackend {
    /// Opens a client and checks it with `PING`.
    pub fn connect(url: &str, options: RedisOptions, clock: Arc<dyn Clock>) -> Result<Self> {
        if options.capacity == 0 {
            return Err(ConfigError::ZeroCapacity.into());
        }
        let client = Client::open(url).with_context(|| format!("invalid redis url '{url}'"))?;
        let mut con = client
            .get_connection()
            .with_context(|| format!("connecting to redis at '{url}'"))?;
        redis::cmd("PING")
            .query::<String>(&mut con)
            .context("redis did not answer PING")?;

        let options = RedisOptions {
            retention: options.retention.max(options.capacity),
            ..options
        };
        debug!(device = %options.device_id, retention = options.retention, "redis backend connected");
        Ok(Self {
            options,
            link: Link::Connected(Session {
                client,
                con: Mutex::new(Some(con)),
                started_at: clock.now_ms(),
                clock,
            }),
        })
    }

    pub fn unconfigured(options: RedisOptions, reason: impl Into<String>) -> Self {
        Self {
            options,
            link: Link::Unconfigured(reason.into()),
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.link, Link::Connected(_))
    }

    /// Statistics of any device, not only the one this backend writes for.
    pub fn stats_for(&self, device_id: &str) -> Result<RunningStats, BackendError> {
        self.with_connection(|con, _| {
            Ok(read_struct(con, &stats_key(device_id))?.unwrap_or_default())
        })
    }

    /// Runs `op` on the cached connection, reconnecting first if an earlier call
    /// dropped it.
    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection, &Session) -> Result<T>,
    ) -> Result<T, BackendError> {
        let session = match &self.link {
            Link::Unconfigured(reason) => {
                return Err(BackendError::Unavailable {
                    backend: BACKEND,
                    reason: reason.clone(),
                });
            }
            Link::Connected(session) => session,
        };

        let mut slot = session.con.lock();
        let mut con = match slot.take() {
            Some(con) => con,
            None => session
                .client
                .get_connection()
                .map_err(|e| BackendError::Unavailable {
                    backend: BACKEND,
                    reason: e.to_string(),
                })?,
        };

        match op(&mut con, session) {
            Ok(value) => {
                *slot = Some(con);
                Ok(value)
            }
            Err(err) if err.downcast_ref::<serde_json::Error>().is_some() => {
                *slot = Some(con);
                Err(BackendError::Codec(format!("{err:#}")))
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "redis command failed, dropping connection");
                Err(BackendError::Storage {
                    backend: BACKEND,
                    message: format!("{err:#}"),
                })
            }
        }
    }

    fn load_current(&self, con: &mut Connection, session: &Session) -> Result<CurrentSnapshot> {
        let current = read_struct(con, &latest_key(&self.options.device_id))?;
        Ok(current.unwrap_or(CurrentSnapshot::waiting(session.started_at)))
    }

    fn load_stats(&self, con: &mut Connection) -> Result<RunningStats> {
        Ok(read_struct(con, &stats_key(&self.options.device_id))?.unwrap_or_default())
    }
}

impl ReadingBackend for RedisBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn device_id(&self) -> &str {
        &self.options.device_id
    }

    fn record(&self, measurement: Measurement) -> Result<StoreSnapshot, BackendError> {
        let device = self.options.device_id.as_str();
        let readings = readings_key(device);
        let seq_key = sequence_key(device);
        let stats_slot = stats_key(device);
        let retention = isize::try_from(self.options.retention).unwrap_or(isize::MAX);

        self.with_connection(|con, session| {
            for _ in 0..MAX_RECORD_ATTEMPTS {
                redis::cmd("WATCH")
                    .arg(&seq_key)
                    .arg(&stats_slot)
                    .query::<()>(con)?;

                let prepared = (|| -> Result<_> {
                    let last_seq: Option<u64> = con.get(&seq_key)?;
                    let stats = self.load_stats(con)?;
                    let window: Vec<Reading> =
                        read_tail(con, &readings, self.options.capacity.saturating_sub(1))?;
                    let reading = measurement
                        .stamp(session.clock.now_ms(), last_seq.unwrap_or(0) + 1);
                    let snapshot = fold_reading(stats, window, reading);
                    let encoded = (
                        serde_json::to_string(&reading)?,
                        serde_json::to_string(&snapshot.current)?,
                        serde_json::to_string(&snapshot.stats)?,
                    );
                    Ok((reading.sequence_id, snapshot, encoded))
                })();
                let (sequence_id, snapshot, (reading_json, current_json, stats_json)) = match prepared {
                    Ok(prepared) => prepared,
                    Err(err) => {
                        let _ = redis::cmd("UNWATCH").query::<()>(con);
                        return Err(err);
                    }
                };

                // Nothing is written unless the whole transaction commits.
                let committed: Option<()> = redis::pipe()
                    .atomic()
                    .rpush(&readings, reading_json)
                    .ignore()
                    .ltrim(&readings, -retention, -1)
                    .ignore()
                    .set(latest_key(device), current_json)
                    .ignore()
                    .set(&stats_slot, stats_json)
                    .ignore()
                    .set(&seq_key, sequence_id)
                    .ignore()
                    .sadd(DEVICES_KEY, device)
                    .ignore()
                    .query(con)?;

                if committed.is_some() {
                    return Ok(snapshot);
                }
                debug!(device, "concurrent write to device, retrying record");
            }
            bail!("record for device '{device}' kept conflicting with other writers")
        })
    }

    fn history(&self, limit: Option<usize>) -> Result<Vec<Reading>, BackendError> {
        let limit = limit
            .unwrap_or(self.options.default_history_limit)
            .min(self.options.retention);
        self.with_connection(|con, _| read_tail(con, &readings_key(&self.options.device_id), limit))
    }

    fn current_snapshot(&self) -> Result<StoreSnapshot, BackendError> {
        self.with_connection(|con, session| {
            Ok(StoreSnapshot {
                current: self.load_current(con, session)?,
                stats: self.load_stats(con)?,
            })
        })
    }

    fn stats(&self) -> Result<RunningStats, BackendError> {
        self.with_connection(|con, _| self.load_stats(con))
    }

    /// Deletes history, statistics and the sequence counter. The latest reading stays.
    fn clear(&self) -> Result<(), BackendError> {
        let device = self.options.device_id.as_str();
        self.with_connection(|con, _| {
            con.del::<_, ()>(vec![readings_key(device), stats_key(device), sequence_key(device)])?;
            Ok(())
        })
    }

    fn mark_stale(&self, threshold: Duration) -> Result<Option<StoreSnapshot>, BackendError> {
        self.with_connection(|con, session| {
            let current = self.load_current(con, session)?;
            let Some(stale) = current.stale_transition(session.clock.now_ms(), threshold) else {
                return Ok(None);
            };
            write_struct(con, &latest_key(&self.options.device_id), &stale)?;
            Ok(Some(StoreSnapshot {
                current: stale,
                stats: self.load_stats(con)?,
            }))
        })
    }

    fn latest_per_device(&self) -> Result<Vec<DeviceSnapshot>, BackendError> {
        self.with_connection(|con, _| {
            let mut device_ids: Vec<String> = con.smembers(DEVICES_KEY)?;
            device_ids.sort();
            let mut devices = Vec::with_capacity(device_ids.len());
            for device_id in device_ids {
                if let Some(current) = read_struct(con, &latest_key(&device_id))? {
                    devices.push(DeviceSnapshot { device_id, current });
                }
            }
            Ok(devices)
        })
    }
}
