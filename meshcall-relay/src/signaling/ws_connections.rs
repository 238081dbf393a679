use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use meshcall_core::{ParticipantId, ServerMessage};
use tokio::sync::mpsc;
use tracing::{error, warn};

/// Open WebSocket connections keyed by the participant they were assigned.
#[derive(Default)]
pub struct WsConnections {
    peers: DashMap<ParticipantId, mpsc::UnboundedSender<Message>>,
}

impl WsConnections {
    pub fn add(&self, participant_id: ParticipantId, tx: mpsc::UnboundedSender<Message>) {
        self.peers.insert(participant_id, tx);
    }

    pub fn remove(&self, participant_id: &ParticipantId) {
        self.peers.remove(participant_id);
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[async_trait]
impl SignalingOutput for WsConnections {
    async fn send(&self, participant_id: &ParticipantId, message: ServerMessage) {
        let Some(peer) = self.peers.get(participant_id) else {
            warn!(
                "Attempted to send signal to disconnected participant {}",
                participant_id
            );
            return;
        };

        match serde_json::to_string(&message) {
            Ok(json) => {
                if let Err(e) = peer.send(Message::Text(json.into())) {
                    error!("Failed to send WS message to {}: {:?}", participant_id, e);
                }
            }
            Err(e) => error!("Failed to serialize signal message: {}", e),
        }
    }
}
