use crate::error::ConnectionError;
use crate::media::MediaTrack;
use async_trait::async_trait;
use meshcall_core::{IceCandidate, IceServerConfig, ParticipantId};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handle to one outgoing track slot on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SenderId(pub u64);

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sender-{}", self.0)
    }
}

/// One connection attempt to a remote participant. Reconnecting to the same
/// participant yields a new `seq`, so events of a closed connection can be
/// told apart from those of its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkKey {
    pub remote_id: ParticipantId,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// Swapped in place; the remote keeps receiving on the same slot.
    Replaced,
    /// The slot changed in a way the remote must learn through a new offer.
    RenegotiationRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// States the connection never recovers from.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

/// Reported asynchronously by a connection to the session that owns it.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    LocalCandidate {
        link: LinkKey,
        candidate: IceCandidate,
    },
    StateChanged {
        link: LinkKey,
        state: ConnectionState,
    },
}

#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(
        &self,
        link: LinkKey,
        ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Result<Box<dyn PeerConnection>, ConnectionError>;
}

/// One transport to one remote participant.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn add_track(&self, track: &Arc<MediaTrack>) -> Result<SenderId, ConnectionError>;

    async fn replace_track(
        &self,
        sender: SenderId,
        track: &Arc<MediaTrack>,
    ) -> Result<ReplaceOutcome, ConnectionError>;

    async fn remove_track(&self, sender: SenderId) -> Result<(), ConnectionError>;

    /// Creates an offer and installs it as the local description.
    async fn create_offer(&self) -> Result<String, ConnectionError>;

    /// Applies a remote offer and returns the installed local answer.
    async fn accept_offer(&self, sdp: String) -> Result<String, ConnectionError>;

    async fn accept_answer(&self, sdp: String) -> Result<(), ConnectionError>;

    /// Drops the local offer that is still waiting for an answer.
    async fn rollback(&self) -> Result<(), ConnectionError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), ConnectionError>;

    async fn close(&self) -> Result<(), ConnectionError>;
}
