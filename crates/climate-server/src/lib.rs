//! # Climate Server
//!
//! HTTP front end for the monitor:
//! - `POST /api/data` ingests readings from the sensor
//! - REST reads for current values, history, stats and per-device snapshots
//! - CSV/JSON export of the buffered history
//! - Live push over WebSocket (`/ws`)
//! - Static UI files from the configured public directory

pub mod config;
pub mod error;
pub mod export;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::AppState;
