use crate::peer::NegotiationState;
use meshcall_core::{ErrorCode, ParticipantId, ProtocolError, RoomId, SignalKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    WebRtc(#[from] webrtc::Error),

    #[error("unknown sender {0}")]
    UnknownSender(u64),

    #[error("peer connection rejected the operation: {0}")]
    Rejected(String),

    #[error("peer connection is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum NegotiationError {
    /// A description arrived that the link cannot take in its current state.
    #[error("{kind} from {remote_id} does not apply to a link in state {state:?}")]
    Conflict {
        remote_id: ParticipantId,
        kind: SignalKind,
        state: NegotiationState,
    },

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Failure of the external device API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("permission to capture {0} was denied")]
    PermissionDenied(String),

    #[error("no {0} device available")]
    Unavailable(String),

    #[error("capture was cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not acquire local media: {0}")]
    MediaAcquisition(#[from] MediaError),

    #[error("relay rejected join ({code:?}): {message}")]
    JoinRejected { code: ErrorCode, message: String },

    #[error("join was cancelled by a leave")]
    JoinCancelled,

    #[error("already in room '{0}'")]
    AlreadyInRoom(RoomId),

    #[error("not in a room")]
    NotInRoom,

    #[error("not sharing the screen")]
    NotSharing,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error("failed to encode relay message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("relay connection failed: {0}")]
    RelayConnect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("relay connection is closed")]
    RelayClosed,

    #[error("session is closed")]
    Closed,
}
