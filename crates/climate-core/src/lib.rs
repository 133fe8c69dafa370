//! # Climate Core
//!
//! This crate provides the core data structures for the temperature/humidity monitor.
//! It defines the `Reading` type, validation of untrusted input into a `Measurement`,
//! the bounded `HistoryBuffer`, the `RunningStats` aggregate and the `ReadingStore`
//! that ties them together.
//! It also defines the `ReadingBackend` trait, with an in-memory implementation,
//! so that a durable store can stand in for the in-memory one.

pub mod backend;
pub mod clock;
pub mod error;
pub mod history;
pub mod reading;
pub mod snapshot;
pub mod stats;
pub mod store;

pub use backend::{DeviceSnapshot, MemoryBackend, ReadingBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BackendError, ConfigError, ValidationError};
pub use history::HistoryBuffer;
pub use reading::{Measurement, RawValue, Reading, ReadingInput};
pub use snapshot::{CurrentSnapshot, Status, StoreSnapshot};
pub use stats::RunningStats;
pub use store::{ReadingStore, StoreConfig, DEFAULT_CAPACITY, DEFAULT_HISTORY_LIMIT};
