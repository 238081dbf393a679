use crate::error::{MediaError, SessionError};
use crate::media::{LocalMedia, MediaSource, MediaTrack, MediaTrackController, TrackId, TrackKind};
use crate::peer::{ConnectionEvent, PeerConnectionManager, PeerConnector};
use crate::session::{
    LinkSnapshot, Reply, SessionCommand, SessionHandle, SessionNotification, SessionSnapshot,
};
use crate::transport::{SignalSink, connect_relay};
use meshcall_core::utils::now_millis;
use meshcall_core::{
    ClientMessage, ErrorCode, MediaState, ParticipantId, ParticipantInfo, RoomId, ServerMessage,
    SignalEnvelope, SignalPayload,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// External collaborators of a session.
#[derive(Clone)]
pub struct SessionConfig {
    pub connector: Arc<dyn PeerConnector>,
    pub media_source: Arc<dyn MediaSource>,
}

enum RoomState {
    Idle,
    /// Waiting for camera and microphone before asking the relay.
    Acquiring { room_id: RoomId },
    /// Join sent, waiting for `joined` or `error`.
    Joining {
        room_id: RoomId,
        reply: Reply<Result<Vec<ParticipantInfo>, SessionError>>,
    },
    InRoom { room_id: RoomId },
}

/// One client's view of a call.
///
/// A single task owns the peer links, the local tracks and the membership
/// list, and handles relay messages, connection events and commands one at a
/// time. Relay input is preferred so signals are never starved by UI traffic.
pub struct MeshSession {
    local_id: Option<ParticipantId>,
    state: RoomState,
    members: HashMap<ParticipantId, ParticipantInfo>,
    peers: PeerConnectionManager,
    media: MediaTrackController,
    media_source: Arc<dyn MediaSource>,
    sink: Arc<dyn SignalSink>,
    incoming: mpsc::UnboundedReceiver<ServerMessage>,
    events_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
    commands_rx: mpsc::UnboundedReceiver<SessionCommand>,
    commands: mpsc::WeakUnboundedSender<SessionCommand>,
    notifications: mpsc::UnboundedSender<SessionNotification>,
}

impl MeshSession {
    /// Starts a session over an already connected relay transport.
    pub fn spawn(
        config: SessionConfig,
        sink: Arc<dyn SignalSink>,
        incoming: mpsc::UnboundedReceiver<ServerMessage>,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionNotification>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let commands = commands_tx.downgrade();

        let session = Self {
            local_id: None,
            state: RoomState::Idle,
            members: HashMap::new(),
            peers: PeerConnectionManager::new(config.connector, sink.clone(), events_tx),
            media: MediaTrackController::new(commands.clone()),
            media_source: config.media_source,
            sink,
            incoming,
            events_rx,
            commands_rx,
            commands,
            notifications: notify_tx,
        };
        tokio::spawn(session.run());

        (SessionHandle::new(commands_tx), notify_rx)
    }

    /// Connects to the relay WebSocket at `url` and starts a session on it.
    pub async fn connect(
        url: &str,
        config: SessionConfig,
    ) -> Result<(SessionHandle, mpsc::UnboundedReceiver<SessionNotification>), SessionError> {
        let relay = connect_relay(url).await?;
        Ok(Self::spawn(config, relay.sink, relay.incoming))
    }

    async fn run(mut self) {
        info!("Session event loop started");

        loop {
            tokio::select! {
                biased;

                msg = self.incoming.recv() => {
                    match msg {
                        Some(m) => self.handle_server_message(m).await,
                        None => {
                            warn!("Relay connection closed");
                            self.on_relay_closed().await;
                            break;
                        }
                    }
                }

                Some(event) = self.events_rx.recv() => {
                    if let Some(remote_id) = self.peers.on_connection_event(event).await {
                        self.notify(SessionNotification::LinkFailed { participant_id: remote_id });
                    }
                }

                cmd = self.commands_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Close) | None => {
                            self.leave().await;
                            break;
                        }
                        Some(c) => self.handle_command(c).await,
                    }
                }
            }
        }

        info!("Session event loop finished");
    }

    async fn handle_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Welcome {
                participant_id,
                ice_servers,
            } => {
                info!("Relay assigned id {}", participant_id);
                self.local_id = Some(participant_id);
                self.peers.set_local_id(participant_id);
                self.peers.set_ice_servers(ice_servers);
                self.notify(SessionNotification::Connected { participant_id });
            }

            ServerMessage::Joined {
                room_id,
                participant_id,
                members,
            } => self.on_joined(room_id, participant_id, members).await,

            ServerMessage::Left { room_id } => debug!("Relay confirmed leave of '{}'", room_id),

            ServerMessage::Signal(envelope) => self.on_signal(envelope).await,

            ServerMessage::MediaStateChanged {
                participant_id,
                state,
            } => {
                if let Some(member) = self.members.get_mut(&participant_id) {
                    member.media = state;
                }
                self.notify(SessionNotification::PeerMediaChanged {
                    participant_id,
                    state,
                });
            }

            ServerMessage::Error { code, message } => self.on_relay_error(code, message),
        }
    }

    async fn on_joined(
        &mut self,
        room_id: RoomId,
        participant_id: ParticipantId,
        members: Vec<ParticipantInfo>,
    ) {
        let reply = match std::mem::replace(&mut self.state, RoomState::Idle) {
            RoomState::Joining {
                room_id: pending,
                reply,
            } if pending == room_id => reply,
            other => {
                warn!("Unexpected joined for room '{}'", room_id);
                self.state = other;
                return;
            }
        };

        self.local_id = Some(participant_id);
        self.peers.set_local_id(participant_id);
        self.state = RoomState::InRoom {
            room_id: room_id.clone(),
        };
        self.peers.enter_room(room_id.clone());
        self.members = members.iter().map(|m| (m.id, m.clone())).collect();
        info!(
            "Joined room '{}' as {} with {} other member(s)",
            room_id,
            participant_id,
            members.len()
        );

        self.publish_media_state().await;
        self.notify(SessionNotification::Joined {
            room_id,
            members: members.clone(),
        });
        let _ = reply.send(Ok(members));
    }

    fn on_relay_error(&mut self, code: ErrorCode, message: String) {
        match std::mem::replace(&mut self.state, RoomState::Idle) {
            RoomState::Joining { room_id, reply } => {
                warn!("Join of '{}' rejected: {:?} {}", room_id, code, message);
                self.media.release();
                let _ = reply.send(Err(SessionError::JoinRejected { code, message }));
            }
            other => {
                self.state = other;
                warn!("Relay error {:?}: {}", code, message);
                self.notify(SessionNotification::RelayError { code, message });
            }
        }
    }

    /// Dispatches one relayed envelope by its type.
    async fn on_signal(&mut self, envelope: SignalEnvelope) {
        let RoomState::InRoom { room_id } = &self.state else {
            debug!("Not in a room, dropping {}", envelope.kind());
            return;
        };
        if *room_id != envelope.room_id {
            debug!("Dropping {} for room '{}'", envelope.kind(), envelope.room_id);
            return;
        }
        let Some(from) = envelope.from_id else {
            warn!("Dropping unstamped {}", envelope.kind());
            return;
        };
        if Some(from) == self.local_id {
            return;
        }

        match envelope.payload {
            SignalPayload::Join { display_name } => {
                self.members.insert(
                    from,
                    ParticipantInfo {
                        id: from,
                        room_id: envelope.room_id,
                        display_name: display_name.clone(),
                        joined_at_ms: now_millis(),
                        media: MediaState::default(),
                    },
                );
                self.notify(SessionNotification::ParticipantJoined {
                    participant_id: from,
                    display_name,
                });

                let tracks = self.media.outgoing_tracks();
                if let Err(e) = self.peers.connect_to(from, &tracks).await {
                    warn!("Could not connect to {}: {}", from, e);
                    self.notify(SessionNotification::LinkFailed {
                        participant_id: from,
                    });
                }
            }

            SignalPayload::Leave => {
                self.members.remove(&from);
                self.peers.remove_link(&from).await;
                self.notify(SessionNotification::ParticipantLeft {
                    participant_id: from,
                });
            }

            SignalPayload::Chat { text, sent_at_ms } => {
                self.notify(SessionNotification::ChatReceived {
                    from,
                    text,
                    sent_at_ms,
                });
            }

            SignalPayload::Offer { .. }
            | SignalPayload::Answer { .. }
            | SignalPayload::Candidate { .. } => {
                let tracks = self.media.outgoing_tracks();
                if let Err(e) = self.peers.handle_signal(envelope, &tracks).await {
                    warn!("Negotiation with {} failed: {}", from, e);
                    self.notify(SessionNotification::LinkFailed {
                        participant_id: from,
                    });
                }
            }
        }
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Join {
                room_id,
                display_name,
                reply,
            } => self.begin_join(room_id, display_name, reply),

            SessionCommand::UserMediaReady {
                room_id,
                display_name,
                media,
                reply,
            } => self.finish_join(room_id, display_name, media, reply).await,

            SessionCommand::Leave { reply } => {
                let _ = reply.send(self.leave().await);
            }

            SessionCommand::SetAudioEnabled { enabled, reply } => {
                let state = self.media.set_audio_enabled(enabled);
                self.publish_media_state().await;
                let _ = reply.send(state);
            }

            SessionCommand::SetVideoEnabled { enabled, reply } => {
                let state = self.media.set_video_enabled(enabled);
                self.publish_media_state().await;
                let _ = reply.send(state);
            }

            SessionCommand::StartScreenShare { reply } => self.begin_screen_share(reply),

            SessionCommand::DisplayMediaReady { media, reply } => {
                let _ = reply.send(self.finish_screen_share(media).await);
            }

            SessionCommand::StopScreenShare { reply } => {
                let result = if self.stop_screen_share().await {
                    Ok(())
                } else {
                    Err(SessionError::NotSharing)
                };
                let _ = reply.send(result);
            }

            SessionCommand::ScreenTrackEnded { track_id } => {
                if self.media.screen_track_id() == Some(track_id) {
                    info!("Screen source {} ended, stopping share", track_id);
                    self.stop_screen_share().await;
                }
            }

            SessionCommand::SendChat { text, to, reply } => {
                let _ = reply.send(self.send_chat(text, to).await);
            }

            SessionCommand::Renegotiate { remote_id, reply } => {
                let result = self
                    .peers
                    .renegotiate(remote_id)
                    .await
                    .map_err(SessionError::from);
                let _ = reply.send(result);
            }

            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }

            SessionCommand::Close => {}
        }
    }

    fn begin_join(
        &mut self,
        room_id: RoomId,
        display_name: String,
        reply: Reply<Result<Vec<ParticipantInfo>, SessionError>>,
    ) {
        match &self.state {
            RoomState::Idle => {}
            RoomState::Acquiring { room_id: current }
            | RoomState::Joining {
                room_id: current, ..
            }
            | RoomState::InRoom { room_id: current } => {
                let _ = reply.send(Err(SessionError::AlreadyInRoom(current.clone())));
                return;
            }
        }

        self.state = RoomState::Acquiring {
            room_id: room_id.clone(),
        };

        let source = self.media_source.clone();
        let commands = self.commands.clone();
        tokio::spawn(async move {
            let media = source.acquire_user_media().await;
            if let Some(tx) = commands.upgrade() {
                let _ = tx.send(SessionCommand::UserMediaReady {
                    room_id,
                    display_name,
                    media,
                    reply,
                });
            }
        });
    }

    async fn finish_join(
        &mut self,
        room_id: RoomId,
        display_name: String,
        media: Result<LocalMedia, MediaError>,
        reply: Reply<Result<Vec<ParticipantInfo>, SessionError>>,
    ) {
        let still_wanted =
            matches!(&self.state, RoomState::Acquiring { room_id: pending } if *pending == room_id);
        if !still_wanted {
            if let Ok(media) = media {
                for track in [media.microphone, media.camera].into_iter().flatten() {
                    track.end();
                }
            }
            let _ = reply.send(Err(SessionError::JoinCancelled));
            return;
        }

        let media = match media {
            Ok(media) => media,
            Err(e) => {
                warn!("Media acquisition for '{}' failed: {}", room_id, e);
                self.state = RoomState::Idle;
                let _ = reply.send(Err(SessionError::MediaAcquisition(e)));
                return;
            }
        };
        self.media.install(media);

        let join = ClientMessage::Join {
            room_id: room_id.clone(),
            display_name,
        };
        if let Err(e) = self.sink.send(join).await {
            self.media.release();
            self.state = RoomState::Idle;
            let _ = reply.send(Err(e));
            return;
        }
        self.state = RoomState::Joining { room_id, reply };
    }

    /// Leaves the current room, or abandons a join in progress. Idempotent.
    async fn leave(&mut self) -> Option<RoomId> {
        let room_id = match std::mem::replace(&mut self.state, RoomState::Idle) {
            RoomState::Idle => return None,
            RoomState::Acquiring { room_id } => return Some(room_id),
            RoomState::Joining { room_id, reply } => {
                let _ = reply.send(Err(SessionError::JoinCancelled));
                room_id
            }
            RoomState::InRoom { room_id } => room_id,
        };

        if let Err(e) = self.sink.send(ClientMessage::Leave).await {
            warn!("Could not tell the relay about leaving: {}", e);
        }
        self.peers.close_all().await;
        self.media.release();
        self.members.clear();

        info!("Left room '{}'", room_id);
        self.notify(SessionNotification::Left {
            room_id: room_id.clone(),
        });
        Some(room_id)
    }

    /// The relay is gone: nothing can be negotiated any more, so every link
    /// and local track is dropped.
    async fn on_relay_closed(&mut self) {
        if let RoomState::Joining { reply, .. } =
            std::mem::replace(&mut self.state, RoomState::Idle)
        {
            let _ = reply.send(Err(SessionError::RelayClosed));
        }
        self.peers.close_all().await;
        self.media.release();
        self.members.clear();
        self.notify(SessionNotification::Disconnected);
    }

    fn begin_screen_share(&mut self, reply: Reply<Result<TrackId, SessionError>>) {
        if !matches!(self.state, RoomState::InRoom { .. }) {
            let _ = reply.send(Err(SessionError::NotInRoom));
            return;
        }

        let source = self.media_source.clone();
        let commands = self.commands.clone();
        tokio::spawn(async move {
            let media = source.acquire_display_media().await;
            if let Some(tx) = commands.upgrade() {
                let _ = tx.send(SessionCommand::DisplayMediaReady { media, reply });
            }
        });
    }

    async fn finish_screen_share(
        &mut self,
        media: Result<Arc<MediaTrack>, MediaError>,
    ) -> Result<TrackId, SessionError> {
        let screen = media?;
        if !matches!(self.state, RoomState::InRoom { .. }) {
            screen.end();
            return Err(SessionError::NotInRoom);
        }
        if screen.kind() != TrackKind::Video {
            screen.end();
            return Err(MediaError::Unavailable("display".into()).into());
        }

        let track_id = screen.id();
        self.media.start_screen_share(screen, &mut self.peers).await;
        self.publish_media_state().await;
        Ok(track_id)
    }

    async fn stop_screen_share(&mut self) -> bool {
        if !self.media.stop_screen_share(&mut self.peers).await {
            return false;
        }
        self.publish_media_state().await;
        self.notify(SessionNotification::ScreenShareStopped);
        true
    }

    async fn send_chat(&self, text: String, to: Option<ParticipantId>) -> Result<(), SessionError> {
        let RoomState::InRoom { room_id } = &self.state else {
            return Err(SessionError::NotInRoom);
        };
        let payload = SignalPayload::Chat {
            text,
            sent_at_ms: now_millis(),
        };
        let envelope = match to {
            Some(to) => SignalEnvelope::targeted(room_id.clone(), to, payload),
            None => SignalEnvelope::room_wide(room_id.clone(), payload),
        };
        self.sink.send(ClientMessage::Signal(envelope)).await
    }

    async fn publish_media_state(&self) {
        if !matches!(self.state, RoomState::InRoom { .. }) {
            return;
        }
        let state = self.media.media_state();
        if let Err(e) = self.sink.send(ClientMessage::MediaState(state)).await {
            warn!("Failed to publish media state: {}", e);
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let room_id = match &self.state {
            RoomState::InRoom { room_id } => Some(room_id.clone()),
            _ => None,
        };

        let mut members: Vec<ParticipantInfo> = self.members.values().cloned().collect();
        members.sort_by(|a, b| a.joined_at_ms.cmp(&b.joined_at_ms).then(a.id.cmp(&b.id)));

        let mut links: Vec<LinkSnapshot> = self
            .peers
            .links()
            .map(|link| LinkSnapshot {
                remote_id: link.remote_id(),
                state: link.state(),
                audio_track: link.outgoing_track(TrackKind::Audio),
                video_track: link.outgoing_track(TrackKind::Video),
            })
            .collect();
        links.sort_by_key(|l| l.remote_id);

        SessionSnapshot {
            participant_id: self.local_id,
            room_id,
            members,
            links,
            media: self.media.media_state(),
            camera_track: self.media.camera_track_id(),
            screen_track: self.media.screen_track_id(),
        }
    }

    fn notify(&self, notification: SessionNotification) {
        let _ = self.notifications.send(notification);
    }
}
