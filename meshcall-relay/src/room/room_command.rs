use meshcall_core::{MediaState, ParticipantId, ParticipantInfo, SignalEnvelope};
use tokio::sync::oneshot;

/// Commands processed one at a time by a room's event loop.
#[derive(Debug)]
pub enum RoomCommand {
    /// Add a member. Replies with the members that were already present.
    Join {
        participant: ParticipantInfo,
        reply: oneshot::Sender<Vec<ParticipantInfo>>,
    },

    /// Remove a member. Replies whether the participant was present.
    Leave {
        participant_id: ParticipantId,
        reply: oneshot::Sender<bool>,
    },

    /// Deliver an envelope already stamped with its sender.
    Route { envelope: SignalEnvelope },

    PublishMediaState {
        participant_id: ParticipantId,
        state: MediaState,
    },

    Members {
        reply: oneshot::Sender<Vec<ParticipantInfo>>,
    },
}
