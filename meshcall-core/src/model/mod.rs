mod message;
mod participant;
mod room;
mod signaling;

pub use message::{ClientMessage, ServerMessage};
pub use participant::{ParticipantId, ParticipantInfo};
pub use room::RoomId;
pub use signaling::{IceCandidate, IceServerConfig, MediaState, SignalEnvelope, SignalKind, SignalPayload};
