use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use climate_core::{
    Clock, ConfigError, MemoryBackend, ReadingBackend, StoreConfig, DEFAULT_CAPACITY,
    DEFAULT_HISTORY_LIMIT,
};
use climate_live::Watchdog;
use climate_redis::{RedisBackend, RedisOptions, DEFAULT_RETENTION};
use tracing::{error, warn};

#[derive(Parser, Debug, Clone)]
#[command(name = "climate-server", about = "Temperature/humidity monitor with live push", version)]
pub struct ServerConfig {
    /// HTTP port for the API, WebSocket and UI
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Directory with the static UI files
    #[arg(long, env = "PUBLIC_DIR", default_value = "public")]
    pub public_dir: PathBuf,

    /// Number of readings kept in history
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// Readings returned by /api/history without a limit
    #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
    pub history_limit: usize,

    /// Seconds without data before the sensor counts as disconnected
    #[arg(long, default_value_t = 60)]
    pub stale_after_secs: u64,

    /// Seconds between staleness checks
    #[arg(long, default_value_t = 30)]
    pub watchdog_secs: u64,

    /// Messages buffered per live subscriber before it is dropped as too slow
    #[arg(long, default_value_t = 64)]
    pub subscriber_buffer: usize,

    /// Redis URL; enables the durable backend
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Device id the readings are stored under
    #[arg(long, env = "DEVICE_ID", default_value = "esp32")]
    pub device_id: String,

    /// Readings kept per device in Redis
    #[arg(long, default_value_t = DEFAULT_RETENTION)]
    pub redis_retention: usize,

    /// Never fall back to memory; answer 503 while Redis is unreachable
    #[arg(long, env = "REQUIRE_REDIS")]
    pub require_redis: bool,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn store_config(&self) -> Result<StoreConfig, ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(StoreConfig {
            capacity: self.capacity,
            default_history_limit: self.history_limit,
        })
    }

    pub fn watchdog(&self) -> Watchdog {
        Watchdog {
            period: Duration::from_secs(self.watchdog_secs.max(1)),
            threshold: Duration::from_secs(self.stale_after_secs),
        }
    }

    /// Picks exactly one backend: Redis when a URL is set and reachable, memory
    /// otherwise. With `require_redis` an unreachable Redis stays selected and every
    /// call reports it as unavailable.
    pub fn build_backend(&self, clock: Arc<dyn Clock>) -> Result<Arc<dyn ReadingBackend>> {
        let store = self.store_config()?;
        let options = RedisOptions {
            device_id: self.device_id.clone(),
            capacity: store.capacity,
            retention: self.redis_retention,
            default_history_limit: store.default_history_limit,
        };

        let reason = match &self.redis_url {
            Some(url) => match RedisBackend::connect(url, options.clone(), clock.clone()) {
                Ok(backend) => return Ok(Arc::new(backend)),
                Err(err) => format!("{err:#}"),
            },
            None => "no redis url configured".to_string(),
        };

        if self.require_redis {
            error!(reason = %reason, "redis required but unavailable, requests will fail");
            return Ok(Arc::new(RedisBackend::unconfigured(options, reason)));
        }
        if self.redis_url.is_some() {
            warn!(reason = %reason, "redis unavailable, using memory storage");
        }
        Ok(Arc::new(MemoryBackend::new(self.device_id.clone(), store, clock)?))
    }
}
