use crate::media::{TrackId, TrackKind};
use crate::peer::{LinkKey, PeerConnection, SenderId};
use meshcall_core::{ParticipantId, SignalEnvelope};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    Idle,
    Offering,
    Answering,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutgoingSender {
    pub sender: SenderId,
    pub track_id: TrackId,
}

/// The connection to one remote participant plus its negotiation bookkeeping.
pub struct PeerLink {
    key: LinkKey,
    connection: Box<dyn PeerConnection>,
    state: NegotiationState,
    has_remote_description: bool,
    /// Candidates held until the remote description is in place.
    pending_signals: VecDeque<SignalEnvelope>,
    senders: HashMap<TrackKind, OutgoingSender>,
}

impl PeerLink {
    pub(crate) fn new(key: LinkKey, connection: Box<dyn PeerConnection>) -> Self {
        Self {
            key,
            connection,
            state: NegotiationState::Idle,
            has_remote_description: false,
            pending_signals: VecDeque::new(),
            senders: HashMap::new(),
        }
    }

    pub fn remote_id(&self) -> ParticipantId {
        self.key.remote_id
    }

    pub fn key(&self) -> LinkKey {
        self.key
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn has_remote_description(&self) -> bool {
        self.has_remote_description
    }

    pub fn pending_signals(&self) -> usize {
        self.pending_signals.len()
    }

    /// Track currently sent on the slot of the given kind.
    pub fn outgoing_track(&self, kind: TrackKind) -> Option<TrackId> {
        self.senders.get(&kind).map(|s| s.track_id)
    }

    pub(crate) fn connection(&self) -> &dyn PeerConnection {
        self.connection.as_ref()
    }

    pub(crate) fn set_state(&mut self, state: NegotiationState) {
        self.state = state;
    }

    pub(crate) fn mark_remote_description(&mut self) {
        self.has_remote_description = true;
    }

    pub(crate) fn hold(&mut self, envelope: SignalEnvelope) {
        self.pending_signals.push_back(envelope);
    }

    pub(crate) fn take_pending(&mut self) -> VecDeque<SignalEnvelope> {
        std::mem::take(&mut self.pending_signals)
    }

    pub(crate) fn sender(&self, kind: TrackKind) -> Option<OutgoingSender> {
        self.senders.get(&kind).copied()
    }

    pub(crate) fn set_sender(&mut self, kind: TrackKind, sender: OutgoingSender) {
        self.senders.insert(kind, sender);
    }

    pub(crate) fn clear_sender(&mut self, kind: TrackKind) -> Option<OutgoingSender> {
        self.senders.remove(&kind)
    }
}
