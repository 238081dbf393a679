use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::SignalKind;

/// Malformed input at the protocol level.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid room id {0:?}: must be 1..=64 characters after trimming")]
    InvalidRoomId(String),

    #[error("invalid participant id {0:?}")]
    InvalidParticipantId(String),

    #[error("{0} envelope requires a target participant")]
    MissingTarget(SignalKind),

    #[error("{0} envelopes are produced by the relay only")]
    RelayOnly(SignalKind),
}

/// Error codes carried by `ServerMessage::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    AlreadyJoined,
    NotInRoom,
    InvalidMessage,
    RoomUnavailable,
}
