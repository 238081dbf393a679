use meshcall_core::{ErrorCode, ParticipantId, ProtocolError, RoomId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("participant {0} already belongs to room '{1}'")]
    AlreadyJoined(ParticipantId, RoomId),

    #[error("participant {0} is not in a room")]
    NotInRoom(ParticipantId),

    #[error("participant {target} is not a member of room '{room_id}'")]
    UnknownTarget {
        room_id: RoomId,
        target: ParticipantId,
    },

    #[error("envelope for room '{addressed}' sent by a member of room '{member_of}'")]
    WrongRoom { addressed: RoomId, member_of: RoomId },

    #[error("room '{0}' is not accepting commands")]
    RoomUnavailable(RoomId),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl RelayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyJoined(..) => ErrorCode::AlreadyJoined,
            Self::NotInRoom(_) | Self::WrongRoom { .. } => ErrorCode::NotInRoom,
            Self::UnknownTarget { .. } | Self::Protocol(_) => ErrorCode::InvalidMessage,
            Self::RoomUnavailable(_) => ErrorCode::RoomUnavailable,
        }
    }
}
