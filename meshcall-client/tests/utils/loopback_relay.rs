use async_trait::async_trait;
use dashmap::DashMap;
use meshcall_client::{
    MeshSession, SessionConfig, SessionError, SessionHandle, SessionNotification, SignalSink,
};
use meshcall_core::{ClientMessage, ParticipantId, ServerMessage};
use meshcall_relay::{RelayConfig, SignalingOutput, SignalingService};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::fake_connection::FakeConnector;
use super::fake_media::FakeMediaSource;

#[derive(Default)]
struct LoopbackOutput {
    clients: DashMap<ParticipantId, mpsc::UnboundedSender<ServerMessage>>,
}

#[async_trait]
impl SignalingOutput for LoopbackOutput {
    async fn send(&self, participant_id: &ParticipantId, message: ServerMessage) {
        if let Some(client) = self.clients.get(participant_id) {
            let _ = client.send(message);
        }
    }
}

struct LoopbackSink {
    participant_id: ParticipantId,
    output: Arc<LoopbackOutput>,
    service: SignalingService,
}

#[async_trait]
impl SignalSink for LoopbackSink {
    async fn send(&self, message: ClientMessage) -> Result<(), SessionError> {
        if !self.output.clients.contains_key(&self.participant_id) {
            return Err(SessionError::RelayClosed);
        }
        self.service
            .handle_message(self.participant_id, message)
            .await;
        Ok(())
    }
}

/// The real relay service wired to in-process sessions instead of sockets.
pub struct LoopbackRelay {
    output: Arc<LoopbackOutput>,
    service: SignalingService,
}

pub struct TestPeer {
    pub id: ParticipantId,
    pub handle: SessionHandle,
    pub notifications: mpsc::UnboundedReceiver<SessionNotification>,
    pub connector: Arc<FakeConnector>,
    pub media: Arc<FakeMediaSource>,
}

impl LoopbackRelay {
    pub fn new() -> Self {
        let output = Arc::new(LoopbackOutput::default());
        let service = SignalingService::new(output.clone(), &RelayConfig::default());
        Self { output, service }
    }

    pub async fn spawn_peer(&self) -> TestPeer {
        self.spawn_peer_with(FakeConnector::gathering(), FakeMediaSource::new())
            .await
    }

    pub async fn spawn_peer_with(
        &self,
        connector: Arc<FakeConnector>,
        media: Arc<FakeMediaSource>,
    ) -> TestPeer {
        let id = ParticipantId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.output.clients.insert(id, tx);
        self.service.on_connected(id).await;

        let sink = Arc::new(LoopbackSink {
            participant_id: id,
            output: self.output.clone(),
            service: self.service.clone(),
        });
        let config = SessionConfig {
            connector: connector.clone(),
            media_source: media.clone(),
        };
        let (handle, notifications) = MeshSession::spawn(config, sink, rx);

        TestPeer {
            id,
            handle,
            notifications,
            connector,
            media,
        }
    }

    /// Drops the peer's transport without a leave, like a closed socket.
    pub async fn disconnect(&self, id: &ParticipantId) {
        self.output.clients.remove(id);
        self.service.on_disconnected(*id).await;
    }
}
