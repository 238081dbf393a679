use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::model::participant::{ParticipantId, ParticipantInfo};
use crate::model::room::RoomId;
use crate::model::signaling::{IceServerConfig, MediaState, SignalEnvelope};

/// Client -> relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join { room_id: RoomId, display_name: String },
    Leave,
    Signal(SignalEnvelope),
    MediaState(MediaState),
}

/// Relay -> client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Welcome {
        participant_id: ParticipantId,
        ice_servers: Vec<IceServerConfig>,
    },
    Joined {
        room_id: RoomId,
        participant_id: ParticipantId,
        members: Vec<ParticipantInfo>,
    },
    Left {
        room_id: RoomId,
    },
    Signal(SignalEnvelope),
    MediaStateChanged {
        participant_id: ParticipantId,
        state: MediaState,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}
