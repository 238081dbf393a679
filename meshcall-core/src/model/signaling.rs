use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProtocolError;
use crate::model::participant::ParticipantId;
use crate::model::room::RoomId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
}

/// Local media switches as announced to the rest of the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaState {
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub screen_sharing: bool,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            video_enabled: true,
            screen_sharing: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Join,
    Leave,
    Offer,
    Answer,
    Candidate,
    Chat,
}

impl SignalKind {
    /// Kinds that always address exactly one participant.
    pub fn requires_target(self) -> bool {
        matches!(self, Self::Offer | Self::Answer | Self::Candidate)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Candidate => "candidate",
            Self::Chat => "chat",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SignalPayload {
    Join {
        display_name: String,
    },
    Leave,
    Offer {
        sdp: String,
        #[serde(default)]
        renegotiation: bool,
    },
    Answer {
        sdp: String,
    },
    Candidate {
        candidate: IceCandidate,
    },
    Chat {
        text: String,
        sent_at_ms: u64,
    },
}

impl SignalPayload {
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Join { .. } => SignalKind::Join,
            Self::Leave => SignalKind::Leave,
            Self::Offer { .. } => SignalKind::Offer,
            Self::Answer { .. } => SignalKind::Answer,
            Self::Candidate { .. } => SignalKind::Candidate,
            Self::Chat { .. } => SignalKind::Chat,
        }
    }
}

/// Unit of signaling traffic. The relay never changes it except for `from_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_id: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_id: Option<ParticipantId>,
    pub room_id: RoomId,
    #[serde(flatten)]
    pub payload: SignalPayload,
}

impl SignalEnvelope {
    pub fn targeted(room_id: RoomId, to_id: ParticipantId, payload: SignalPayload) -> Self {
        Self {
            from_id: None,
            to_id: Some(to_id),
            room_id,
            payload,
        }
    }

    pub fn room_wide(room_id: RoomId, payload: SignalPayload) -> Self {
        Self {
            from_id: None,
            to_id: None,
            room_id,
            payload,
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.payload.kind()
    }

    pub fn stamped(mut self, from_id: ParticipantId) -> Self {
        self.from_id = Some(from_id);
        self
    }

    /// Checks an envelope submitted by a client before it is routed.
    pub fn validate_client_submitted(&self) -> Result<(), ProtocolError> {
        let kind = self.kind();
        if matches!(kind, SignalKind::Join | SignalKind::Leave) {
            return Err(ProtocolError::RelayOnly(kind));
        }
        if kind.requires_target() && self.to_id.is_none() {
            return Err(ProtocolError::MissingTarget(kind));
        }
        Ok(())
    }
}
