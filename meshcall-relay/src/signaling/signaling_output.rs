use async_trait::async_trait;
use meshcall_core::{ParticipantId, ServerMessage};

/// Delivery side of the relay: whatever holds the participants' connections.
/// Rooms call it to push messages out; undeliverable messages are dropped.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn send(&self, participant_id: &ParticipantId, message: ServerMessage);
}
