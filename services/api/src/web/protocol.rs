//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the client and the API server
//! for live session tracking.

use drive_track_core::{Session, TimeOfDay, TimerSnapshot, Weather};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Begins tracking. The offset is the client's local UTC offset, used to
    /// decide the time of day; UTC when absent.
    Start {
        #[serde(default)]
        utc_offset_minutes: Option<i32>,
    },

    Stop,

    /// Continues a stopped session, keeping what was accumulated.
    Resume,

    /// Throws away a stopped session.
    Discard,

    /// Persists a stopped session. Weather defaults to sunny.
    Save {
        #[serde(default)]
        weather: Option<Weather>,
    },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    TrackingStarted { time_of_day: TimeOfDay },

    /// Sent once per second while tracking.
    Tick { snapshot: TimerSnapshot },

    Stopped { snapshot: TimerSnapshot },

    Resumed,

    Discarded,

    Saved { session: Session },

    /// The command was not valid for the current timer state, or the session
    /// failed validation. Nothing changed.
    Rejected { reason: String },

    /// A collaborator failed; the session is still held.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_client_commands() {
        let start: ClientMessage =
            serde_json::from_value(json!({ "type": "start", "utc_offset_minutes": -300 })).unwrap();
        assert_eq!(
            start,
            ClientMessage::Start {
                utc_offset_minutes: Some(-300)
            }
        );

        let bare: ClientMessage = serde_json::from_value(json!({ "type": "start" })).unwrap();
        assert_eq!(
            bare,
            ClientMessage::Start {
                utc_offset_minutes: None
            }
        );

        let save: ClientMessage =
            serde_json::from_value(json!({ "type": "save", "weather": "Rainy" })).unwrap();
        assert_eq!(
            save,
            ClientMessage::Save {
                weather: Some(Weather::Rainy)
            }
        );

        assert!(serde_json::from_value::<ClientMessage>(json!({ "type": "jump" })).is_err());
    }

    #[test]
    fn server_messages_are_tagged() {
        let value = serde_json::to_value(ServerMessage::Rejected {
            reason: "no".into(),
        })
        .unwrap();
        assert_eq!(value, json!({ "type": "rejected", "reason": "no" }));

        let value = serde_json::to_value(ServerMessage::TrackingStarted {
            time_of_day: TimeOfDay::Night,
        })
        .unwrap();
        assert_eq!(value, json!({ "type": "tracking_started", "time_of_day": "Night" }));
    }
}
