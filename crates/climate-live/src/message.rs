use climate_core::StoreSnapshot;
use serde::{Deserialize, Serialize};

/// A message pushed to live subscribers.
///
/// Serialized as `{"type": "initial" | "update", "current": {..}, "stats": {..}}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LiveMessage {
    /// Sent once, right after a subscriber connects.
    Initial(StoreSnapshot),
    /// Sent after every recorded reading and every stale transition.
    Update(StoreSnapshot),
}

impl LiveMessage {
    pub fn snapshot(&self) -> &StoreSnapshot {
        match self {
            Self::Initial(snapshot) | Self::Update(snapshot) => snapshot,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Initial(_) => "initial",
            Self::Update(_) => "update",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use climate_core::{CurrentSnapshot, RunningStats};

    #[test]
    fn tagged_with_type_field() {
        let snapshot = StoreSnapshot {
            current: CurrentSnapshot::waiting(42),
            stats: RunningStats::default(),
        };
        let json = serde_json::to_value(LiveMessage::Initial(snapshot)).unwrap();
        assert_eq!(json["type"], "initial");
        assert_eq!(json["current"]["status"], "waiting");
        assert_eq!(json["stats"]["maxTemp"], -999.0);

        let json = serde_json::to_string(&LiveMessage::Update(snapshot)).unwrap();
        let back: LiveMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, LiveMessage::Update(snapshot));
        assert_eq!(back.kind(), "update");
    }
}
