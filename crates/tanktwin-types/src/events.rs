//! Messages pushed to live subscribers.
//!
//! Every event serializes as `{"topic": ..., "payload": ...}`, which is the
//! frame format of the `/ws` stream.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::structs::{AlertRecord, DecisionLogEntry, TankState};

/// An event published by the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "topic", content = "payload", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TwinEvent {
    /// The state after a tick or a command.
    TankUpdate(TankState),
    /// A newly raised alert.
    Alert(AlertRecord),
    /// A new decision log entry.
    AiLog(DecisionLogEntry),
    /// The full alert list after an acknowledge or clear.
    AlertsUpdate(Vec<AlertRecord>),
}

impl TwinEvent {
    /// Return the topic name this event is published under.
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::TankUpdate(_) => "tank_update",
            Self::Alert(_) => "alert",
            Self::AiLog(_) => "ai_log",
            Self::AlertsUpdate(_) => "alerts_update",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::enums::DecisionLogKind;
    use crate::structs::TankConfig;

    #[test]
    fn frames_carry_topic_and_payload() {
        let state = TankState::initial(&TankConfig::default(), Utc::now());
        let event = TwinEvent::TankUpdate(state);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["topic"], event.topic());
        assert_eq!(json["payload"]["water_level"], 60.0);
    }

    #[test]
    fn topic_matches_serialized_tag() {
        let event = TwinEvent::AiLog(DecisionLogEntry {
            timestamp: Utc::now(),
            message: String::from("Simulation started"),
            kind: DecisionLogKind::System,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["topic"], "ai_log");
        assert_eq!(json["payload"]["type"], "system");

        let empty = TwinEvent::AlertsUpdate(Vec::new());
        assert_eq!(serde_json::to_value(&empty).unwrap()["topic"], empty.topic());
    }
}
