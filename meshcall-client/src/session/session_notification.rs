use crate::media::TrackId;
use crate::peer::NegotiationState;
use meshcall_core::{ErrorCode, MediaState, ParticipantId, ParticipantInfo, RoomId};

/// Events for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotification {
    Connected {
        participant_id: ParticipantId,
    },
    Joined {
        room_id: RoomId,
        members: Vec<ParticipantInfo>,
    },
    ParticipantJoined {
        participant_id: ParticipantId,
        display_name: String,
    },
    ParticipantLeft {
        participant_id: ParticipantId,
    },
    PeerMediaChanged {
        participant_id: ParticipantId,
        state: MediaState,
    },
    /// The link to this participant was torn down without it leaving.
    LinkFailed {
        participant_id: ParticipantId,
    },
    ChatReceived {
        from: ParticipantId,
        text: String,
        sent_at_ms: u64,
    },
    ScreenShareStopped,
    RelayError {
        code: ErrorCode,
        message: String,
    },
    Left {
        room_id: RoomId,
    },
    Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkSnapshot {
    pub remote_id: ParticipantId,
    pub state: NegotiationState,
    pub audio_track: Option<TrackId>,
    pub video_track: Option<TrackId>,
}

/// Point-in-time view of a session, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub participant_id: Option<ParticipantId>,
    pub room_id: Option<RoomId>,
    pub members: Vec<ParticipantInfo>,
    /// Sorted by remote id.
    pub links: Vec<LinkSnapshot>,
    pub media: MediaState,
    pub camera_track: Option<TrackId>,
    pub screen_track: Option<TrackId>,
}

impl SessionSnapshot {
    pub fn link(&self, remote_id: &ParticipantId) -> Option<&LinkSnapshot> {
        self.links.iter().find(|l| l.remote_id == *remote_id)
    }

    pub fn all_stable(&self) -> bool {
        self.links
            .iter()
            .all(|l| l.state == NegotiationState::Stable)
    }
}
