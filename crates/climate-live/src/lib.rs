//! # Climate Live
//!
//! Live fan-out of store snapshots to connected viewers.
//! `LiveDistributor` owns the subscriber set, `Monitor` serializes ingestion with
//! the broadcast that follows it, and `Watchdog` flags a sensor that has gone quiet.

pub mod distributor;
pub mod message;
pub mod monitor;
pub mod watchdog;

pub use distributor::{
    BroadcastReport, DeliveryError, LiveDistributor, Subscriber, SubscriberId, SubscriberState,
};
pub use message::LiveMessage;
pub use monitor::{ConnectError, Monitor};
pub use watchdog::Watchdog;
