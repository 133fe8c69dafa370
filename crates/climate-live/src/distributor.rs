//! The set of live subscribers and the broadcast loop over it.

use std::collections::BTreeMap;
use std::fmt;

use climate_core::StoreSnapshot;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::message::LiveMessage;

/// Why a push to one subscriber failed. Only ever closes that subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("subscriber is closed")]
    Closed,
    #[error("subscriber is not keeping up")]
    Lagging,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Receiving end of live pushes. `push` must not block.
pub trait Subscriber: Send + Sync {
    fn push(&self, message: &LiveMessage) -> Result<(), DeliveryError>;
}

impl Subscriber for mpsc::Sender<LiveMessage> {
    fn push(&self, message: &LiveMessage) -> Result<(), DeliveryError> {
        self.try_send(*message).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::Lagging,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Connecting,
    Open,
    Closed,
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

struct Entry {
    subscriber: Box<dyn Subscriber>,
    state: SubscriberState,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: BTreeMap<SubscriberId, Entry>,
}

/// Dynamic set of subscribers.
///
/// Closed subscribers are removed from the set; asking for an id that is no longer
/// present reports `SubscriberState::Closed`.
#[derive(Default)]
pub struct LiveDistributor {
    registry: Mutex<Registry>,
}

impl LiveDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber and sends it `initial` as an `Initial` message.
    ///
    /// The subscriber only joins the broadcast set once the initial push succeeded.
    pub fn subscribe(
        &self,
        subscriber: Box<dyn Subscriber>,
        initial: StoreSnapshot,
    ) -> Result<SubscriberId, DeliveryError> {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = SubscriberId(registry.next_id);

        let mut entry = Entry {
            subscriber,
            state: SubscriberState::Connecting,
        };
        if let Err(err) = entry.subscriber.push(&LiveMessage::Initial(initial)) {
            entry.state = SubscriberState::Closed;
            warn!(subscriber = %id, error = %err, "initial push failed");
            return Err(err);
        }
        entry.state = SubscriberState::Open;
        registry.entries.insert(id, entry);
        debug!(subscriber = %id, open = registry.entries.len(), "subscriber opened");
        Ok(id)
    }

    /// Closes and removes a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut registry = self.registry.lock();
        let removed = registry.entries.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, open = registry.entries.len(), "subscriber closed");
        }
        removed
    }

    /// Pushes an `Update` to every open subscriber.
    ///
    /// A failing subscriber is closed and removed; the others still get the message.
    pub fn broadcast(&self, snapshot: &StoreSnapshot) -> BroadcastReport {
        let message = LiveMessage::Update(*snapshot);
        let mut registry = self.registry.lock();
        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();

        for (id, entry) in registry.entries.iter_mut() {
            if entry.state != SubscriberState::Open {
                continue;
            }
            match entry.subscriber.push(&message) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(subscriber = %id, error = %err, "dropping subscriber");
                    entry.state = SubscriberState::Closed;
                    failed.push(*id);
                }
            }
        }

        for id in failed {
            registry.entries.remove(&id);
            report.dropped += 1;
        }
        report
    }

    pub fn state(&self, id: SubscriberId) -> SubscriberState {
        self.registry
            .lock()
            .entries
            .get(&id)
            .map_or(SubscriberState::Closed, |entry| entry.state)
    }

    pub fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
