use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::room::RoomRegistry;
use crate::signaling::SignalingOutput;
use meshcall_core::{ClientMessage, ErrorCode, IceServerConfig, ParticipantId, ServerMessage};
use std::sync::Arc;
use tracing::{info, warn};

const FALLBACK_DISPLAY_NAME: &str = "Guest";

/// Transport-independent front of the relay: one entry point per connection
/// event, one dispatcher for everything a client can send.
#[derive(Clone)]
pub struct SignalingService {
    registry: RoomRegistry,
    output: Arc<dyn SignalingOutput>,
    ice_servers: Arc<Vec<IceServerConfig>>,
}

impl SignalingService {
    pub fn new(output: Arc<dyn SignalingOutput>, config: &RelayConfig) -> Self {
        Self {
            registry: RoomRegistry::new(output.clone(), config.room_capacity),
            output,
            ice_servers: Arc::new(config.ice_servers.clone()),
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub async fn on_connected(&self, participant_id: ParticipantId) {
        self.output
            .send(
                &participant_id,
                ServerMessage::Welcome {
                    participant_id,
                    ice_servers: self.ice_servers.as_ref().clone(),
                },
            )
            .await;
    }

    pub async fn on_disconnected(&self, participant_id: ParticipantId) {
        self.registry.disconnect(participant_id).await;
    }

    pub async fn handle_message(&self, participant_id: ParticipantId, message: ClientMessage) {
        match message {
            ClientMessage::Join {
                room_id,
                display_name,
            } => {
                let display_name = match display_name.trim() {
                    "" => FALLBACK_DISPLAY_NAME.to_owned(),
                    name => name.to_owned(),
                };
                match self
                    .registry
                    .join(room_id.clone(), participant_id, display_name)
                    .await
                {
                    Ok(outcome) => info!(
                        "{} joined '{}' with {} existing member(s)",
                        participant_id,
                        room_id,
                        outcome.members.len()
                    ),
                    Err(e) => {
                        warn!("Join of '{}' by {} rejected: {}", room_id, participant_id, e);
                        self.reply_error(participant_id, &e).await;
                    }
                }
            }

            ClientMessage::Leave => {
                if let Some(room_id) = self.registry.leave(participant_id).await {
                    self.output
                        .send(&participant_id, ServerMessage::Left { room_id })
                        .await;
                }
            }

            ClientMessage::Signal(envelope) => {
                let kind = envelope.kind();
                if let Err(e) = self.registry.route(participant_id, envelope).await {
                    warn!("Dropping {} from {}: {}", kind, participant_id, e);
                    self.reply_error(participant_id, &e).await;
                }
            }

            ClientMessage::MediaState(state) => {
                if let Err(e) = self.registry.publish_media_state(participant_id, state).await {
                    warn!("Media state from {} rejected: {}", participant_id, e);
                    self.reply_error(participant_id, &e).await;
                }
            }
        }
    }

    /// Text that did not parse as a `ClientMessage`.
    pub async fn reject_malformed(&self, participant_id: ParticipantId, reason: String) {
        self.output
            .send(
                &participant_id,
                ServerMessage::Error {
                    code: ErrorCode::InvalidMessage,
                    message: reason,
                },
            )
            .await;
    }

    async fn reply_error(&self, participant_id: ParticipantId, err: &RelayError) {
        self.output
            .send(
                &participant_id,
                ServerMessage::Error {
                    code: err.code(),
                    message: err.to_string(),
                },
            )
            .await;
    }
}
