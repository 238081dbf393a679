use crate::error::NegotiationError;
use crate::media::{MediaTrack, TrackKind};
use crate::peer::{
    ConnectionEvent, LinkKey, NegotiationState, OutgoingSender, PeerConnector, PeerLink,
    ReplaceOutcome, SignalReorderBuffer,
};
use crate::transport::SignalSink;
use meshcall_core::{
    ClientMessage, IceServerConfig, ParticipantId, RoomId, SignalEnvelope, SignalKind,
    SignalPayload,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Owns every `PeerLink` of the local participant.
///
/// All methods take `&mut self`; the session calls them from one task, so a
/// handler finishes before the next signal is looked at.
pub struct PeerConnectionManager {
    local_id: Option<ParticipantId>,
    room_id: Option<RoomId>,
    ice_servers: Vec<IceServerConfig>,
    links: HashMap<ParticipantId, PeerLink>,
    buffer: SignalReorderBuffer,
    connector: Arc<dyn PeerConnector>,
    sink: Arc<dyn SignalSink>,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    next_seq: u64,
}

impl PeerConnectionManager {
    pub fn new(
        connector: Arc<dyn PeerConnector>,
        sink: Arc<dyn SignalSink>,
        events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        Self {
            local_id: None,
            room_id: None,
            ice_servers: Vec::new(),
            links: HashMap::new(),
            buffer: SignalReorderBuffer::new(),
            connector,
            sink,
            events_tx,
            next_seq: 0,
        }
    }

    pub fn set_ice_servers(&mut self, ice_servers: Vec<IceServerConfig>) {
        self.ice_servers = ice_servers;
    }

    /// Needed to settle crossing renegotiation offers.
    pub fn set_local_id(&mut self, local_id: ParticipantId) {
        self.local_id = Some(local_id);
    }

    /// The side with the lower id gives way when both sides renegotiate at
    /// once.
    pub fn is_polite_towards(&self, remote_id: &ParticipantId) -> bool {
        self.local_id.is_some_and(|local| local < *remote_id)
    }

    pub fn enter_room(&mut self, room_id: RoomId) {
        self.room_id = Some(room_id);
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    pub fn link(&self, remote_id: &ParticipantId) -> Option<&PeerLink> {
        self.links.get(remote_id)
    }

    pub fn links(&self) -> impl Iterator<Item = &PeerLink> {
        self.links.values()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn buffered(&self, remote_id: &ParticipantId) -> usize {
        self.buffer.pending(remote_id)
    }

    /// Initiator path: the local side was already in the room when
    /// `remote_id` joined.
    pub async fn connect_to(
        &mut self,
        remote_id: ParticipantId,
        tracks: &[Arc<MediaTrack>],
    ) -> Result<(), NegotiationError> {
        if self.links.contains_key(&remote_id) {
            warn!("Link to {} already exists, not offering again", remote_id);
            return Ok(());
        }

        self.open_link(remote_id, tracks).await?;
        if let Err(e) = self.send_offer(remote_id, false).await {
            self.remove_link(&remote_id).await;
            return Err(e);
        }
        Ok(())
    }

    /// Single entry point for offer / answer / candidate envelopes.
    ///
    /// Conflicts are logged and ignored; connection failures have already
    /// torn the link down when they are returned.
    pub async fn handle_signal(
        &mut self,
        envelope: SignalEnvelope,
        tracks: &[Arc<MediaTrack>],
    ) -> Result<(), NegotiationError> {
        let Some(from) = envelope.from_id else {
            warn!("Dropping unstamped {} envelope", envelope.kind());
            return Ok(());
        };
        if self.room_id.as_ref() != Some(&envelope.room_id) {
            debug!(
                "Dropping {} from {} for room '{}'",
                envelope.kind(),
                from,
                envelope.room_id
            );
            return Ok(());
        }

        let result = match envelope.payload {
            SignalPayload::Offer { sdp, renegotiation } => {
                self.on_offer(from, sdp, renegotiation, tracks).await
            }
            SignalPayload::Answer { sdp } => self.on_answer(from, sdp).await,
            SignalPayload::Candidate { .. } => self.on_candidate(from, envelope).await,
            _ => {
                debug!("{} from {} is not a negotiation signal", envelope.kind(), from);
                Ok(())
            }
        };

        match result {
            Err(e @ NegotiationError::Conflict { .. }) => {
                warn!("Ignoring signal: {}", e);
                Ok(())
            }
            other => other,
        }
    }

    /// Receiver path, or a renegotiation of an existing link. An offer that
    /// crosses our own pending renegotiation is answered only by the polite
    /// side, which rolls back and offers again afterwards.
    pub async fn on_offer(
        &mut self,
        from: ParticipantId,
        sdp: String,
        renegotiation: bool,
        tracks: &[Arc<MediaTrack>],
    ) -> Result<(), NegotiationError> {
        let polite = self.is_polite_towards(&from);
        let mut reoffer = false;
        match self.links.get(&from).map(|l| (l.state(), l.has_remote_description())) {
            None => self.open_link(from, tracks).await?,
            Some((NegotiationState::Stable, _)) if renegotiation => {}
            // Both sides renegotiated at once.
            Some((NegotiationState::Offering, true)) if renegotiation && polite => {
                self.rollback_offer(from).await?;
                reoffer = true;
            }
            Some((state, _)) => {
                return Err(NegotiationError::Conflict {
                    remote_id: from,
                    kind: SignalKind::Offer,
                    state,
                });
            }
        }

        let Some(link) = self.links.get_mut(&from) else {
            return Ok(());
        };
        link.set_state(NegotiationState::Answering);
        let answer = link.connection().accept_offer(sdp).await;

        let answer = match answer {
            Ok(answer) => answer,
            Err(e) => {
                self.remove_link(&from).await;
                return Err(e.into());
            }
        };
        if let Some(link) = self.links.get_mut(&from) {
            link.mark_remote_description();
            link.set_state(NegotiationState::Stable);
        }
        self.flush_pending(&from).await;

        self.emit(from, SignalPayload::Answer { sdp: answer }).await;
        info!(
            "Answered {}offer from {}",
            if renegotiation { "re-" } else { "" },
            from
        );

        // Our own change still has to reach the remote.
        if reoffer {
            self.send_offer(from, true).await?;
        }
        Ok(())
    }

    async fn rollback_offer(&mut self, remote_id: ParticipantId) -> Result<(), NegotiationError> {
        let Some(link) = self.links.get_mut(&remote_id) else {
            return Ok(());
        };
        let outcome = link.connection().rollback().await;
        if let Err(e) = outcome {
            self.remove_link(&remote_id).await;
            return Err(e.into());
        }
        link.set_state(NegotiationState::Stable);
        info!("Rolled back local offer to {} to answer its offer", remote_id);
        Ok(())
    }

    pub async fn on_answer(
        &mut self,
        from: ParticipantId,
        sdp: String,
    ) -> Result<(), NegotiationError> {
        let Some(link) = self.links.get(&from) else {
            debug!("Answer from {} arrived after its link was closed", from);
            return Ok(());
        };
        if link.state() != NegotiationState::Offering {
            return Err(NegotiationError::Conflict {
                remote_id: from,
                kind: SignalKind::Answer,
                state: link.state(),
            });
        }

        if let Err(e) = link.connection().accept_answer(sdp).await {
            self.remove_link(&from).await;
            return Err(e.into());
        }
        if let Some(link) = self.links.get_mut(&from) {
            link.mark_remote_description();
            link.set_state(NegotiationState::Stable);
        }
        self.flush_pending(&from).await;

        debug!("Link to {} is stable", from);
        Ok(())
    }

    /// Applies a remote candidate, or holds it until its link can take it.
    pub async fn on_candidate(
        &mut self,
        from: ParticipantId,
        envelope: SignalEnvelope,
    ) -> Result<(), NegotiationError> {
        let Some(link) = self.links.get_mut(&from) else {
            debug!("Buffering candidate from {} until a link exists", from);
            self.buffer.enqueue(from, envelope);
            return Ok(());
        };
        if !link.has_remote_description() {
            link.hold(envelope);
            return Ok(());
        }

        apply_candidate(link, envelope).await;
        Ok(())
    }

    /// Starts a new offer on a stable link, e.g. after a track was added.
    pub async fn renegotiate(&mut self, remote_id: ParticipantId) -> Result<(), NegotiationError> {
        let Some(link) = self.links.get(&remote_id) else {
            return Ok(());
        };
        if link.state() != NegotiationState::Stable {
            return Err(NegotiationError::Conflict {
                remote_id,
                kind: SignalKind::Offer,
                state: link.state(),
            });
        }
        self.send_offer(remote_id, true).await
    }

    /// Puts `track` (or nothing) on the `kind` slot of every link.
    ///
    /// In-place replacement is tried first; links that need a new
    /// description are renegotiated once all slots were updated.
    pub async fn replace_outgoing(&mut self, kind: TrackKind, track: Option<&Arc<MediaTrack>>) {
        let mut needs_offer = Vec::new();

        for link in self.links.values_mut() {
            let remote_id = link.remote_id();
            let current = link.sender(kind);

            let renegotiate = match (current, track) {
                (Some(current), Some(track)) => {
                    match link.connection().replace_track(current.sender, track).await {
                        Ok(outcome) => {
                            link.set_sender(
                                kind,
                                OutgoingSender {
                                    sender: current.sender,
                                    track_id: track.id(),
                                },
                            );
                            outcome == ReplaceOutcome::RenegotiationRequired
                        }
                        Err(e) => {
                            warn!(
                                "Replacing {:?} towards {} in place failed, re-adding: {}",
                                kind, remote_id, e
                            );
                            let _ = link.connection().remove_track(current.sender).await;
                            link.clear_sender(kind);
                            attach_track(link, track).await
                        }
                    }
                }
                (None, Some(track)) => attach_track(link, track).await,
                (Some(current), None) => {
                    if let Err(e) = link.connection().remove_track(current.sender).await {
                        warn!("Removing {:?} towards {} failed: {}", kind, remote_id, e);
                    }
                    link.clear_sender(kind);
                    true
                }
                (None, None) => false,
            };

            if renegotiate {
                needs_offer.push(remote_id);
            }
        }

        for remote_id in needs_offer {
            if let Err(e) = self.renegotiate(remote_id).await {
                warn!("Renegotiation with {} failed: {}", remote_id, e);
            }
        }
    }

    /// Reacts to something a connection reported. Returns the remote whose
    /// link was torn down because its connection died.
    pub async fn on_connection_event(&mut self, event: ConnectionEvent) -> Option<ParticipantId> {
        match event {
            ConnectionEvent::LocalCandidate { link, candidate } => {
                if self.is_current(&link) {
                    self.emit(link.remote_id, SignalPayload::Candidate { candidate })
                        .await;
                }
                None
            }
            ConnectionEvent::StateChanged { link, state } => {
                if !state.is_terminal() || !self.is_current(&link) {
                    return None;
                }
                warn!("Connection to {} ended: {:?}", link.remote_id, state);
                self.remove_link(&link.remote_id)
                    .await
                    .then_some(link.remote_id)
            }
        }
    }

    /// Closes and forgets the link to `remote_id`. Safe to call repeatedly;
    /// returns whether a link was actually removed.
    pub async fn remove_link(&mut self, remote_id: &ParticipantId) -> bool {
        let discarded = self.buffer.discard(remote_id);
        if discarded > 0 {
            debug!("Discarded {} buffered signal(s) of {}", discarded, remote_id);
        }

        let Some(link) = self.links.remove(remote_id) else {
            return false;
        };
        if let Err(e) = link.connection().close().await {
            warn!("Failed to close connection to {}: {}", remote_id, e);
        }
        info!("Closed link to {}, {} link(s) left", remote_id, self.links.len());
        true
    }

    /// Tears down every link, e.g. on leave or when the relay is gone.
    pub async fn close_all(&mut self) {
        let remote_ids: Vec<ParticipantId> = self.links.keys().copied().collect();
        for remote_id in remote_ids {
            self.remove_link(&remote_id).await;
        }
        self.buffer.clear();
        self.room_id = None;
    }

    async fn open_link(
        &mut self,
        remote_id: ParticipantId,
        tracks: &[Arc<MediaTrack>],
    ) -> Result<(), NegotiationError> {
        self.next_seq += 1;
        let key = LinkKey {
            remote_id,
            seq: self.next_seq,
        };

        let connection = self
            .connector
            .connect(key, &self.ice_servers, self.events_tx.clone())
            .await?;
        let mut link = PeerLink::new(key, connection);

        for track in tracks {
            match link.connection().add_track(track).await {
                Ok(sender) => link.set_sender(
                    track.kind(),
                    OutgoingSender {
                        sender,
                        track_id: track.id(),
                    },
                ),
                Err(e) => {
                    let _ = link.connection().close().await;
                    return Err(e.into());
                }
            }
        }

        self.links.insert(remote_id, link);
        debug!("Opened link to {}", remote_id);

        for envelope in self.buffer.drain(&remote_id) {
            self.on_candidate(remote_id, envelope).await?;
        }
        Ok(())
    }

    async fn send_offer(
        &mut self,
        remote_id: ParticipantId,
        renegotiation: bool,
    ) -> Result<(), NegotiationError> {
        let Some(link) = self.links.get_mut(&remote_id) else {
            return Ok(());
        };
        let sdp = link.connection().create_offer().await?;
        link.set_state(NegotiationState::Offering);

        self.emit(remote_id, SignalPayload::Offer { sdp, renegotiation })
            .await;
        Ok(())
    }

    async fn flush_pending(&mut self, remote_id: &ParticipantId) {
        let Some(link) = self.links.get_mut(remote_id) else {
            return;
        };
        for envelope in link.take_pending() {
            apply_candidate(link, envelope).await;
        }
    }

    async fn emit(&self, to: ParticipantId, payload: SignalPayload) {
        let Some(room_id) = self.room_id.clone() else {
            warn!("Not in a room, dropping {} for {}", payload.kind(), to);
            return;
        };
        let envelope = SignalEnvelope::targeted(room_id, to, payload);
        if let Err(e) = self.sink.send(ClientMessage::Signal(envelope)).await {
            warn!("Failed to send signal to {}: {}", to, e);
        }
    }

    fn is_current(&self, key: &LinkKey) -> bool {
        self.links
            .get(&key.remote_id)
            .is_some_and(|link| link.key() == *key)
    }
}

/// Adds `track` on a fresh slot. Returns true: the remote has to be told.
async fn attach_track(link: &mut PeerLink, track: &Arc<MediaTrack>) -> bool {
    match link.connection().add_track(track).await {
        Ok(sender) => {
            link.set_sender(
                track.kind(),
                OutgoingSender {
                    sender,
                    track_id: track.id(),
                },
            );
            true
        }
        Err(e) => {
            warn!("Adding {} towards {} failed: {}", track.label(), link.remote_id(), e);
            false
        }
    }
}

async fn apply_candidate(link: &PeerLink, envelope: SignalEnvelope) {
    let SignalPayload::Candidate { candidate } = envelope.payload else {
        return;
    };
    if let Err(e) = link.connection().add_ice_candidate(candidate).await {
        warn!("Failed to add ICE candidate for {}: {}", link.remote_id(), e);
    }
}
