use crate::error::ConnectionError;
use crate::media::{MediaTrack, TrackId, TrackKind};
use crate::peer::{
    ConnectionEvent, ConnectionState, LinkKey, PeerConnection, PeerConnector, ReplaceOutcome,
    SenderId,
};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use meshcall_core::{IceCandidate, IceServerConfig, ParticipantId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

const STREAM_ID: &str = "meshcall";

type SampleTracks = Arc<DashMap<TrackId, Arc<TrackLocalStaticSample>>>;

/// `PeerConnector` backed by the `webrtc` crate.
///
/// Each local `MediaTrack` maps to exactly one `TrackLocalStaticSample` that
/// every connection sends, so capture code writes a frame once for the whole
/// mesh.
#[derive(Default)]
pub struct WebRtcConnector {
    tracks: SampleTracks,
}

impl WebRtcConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_track(&self, track: &Arc<MediaTrack>) -> Arc<TrackLocalStaticSample> {
        shared_sample_track(&self.tracks, track)
    }

    /// Number of local tracks that currently have a sample track.
    pub fn tracked(&self) -> usize {
        self.tracks.len()
    }

    /// Feeds one encoded frame to every link sending `track`. Frames of a
    /// disabled or ended track are dropped.
    pub async fn write_sample(
        &self,
        track: &Arc<MediaTrack>,
        sample: &Sample,
    ) -> Result<(), ConnectionError> {
        if !track.is_enabled() || track.is_ended() {
            return Ok(());
        }
        self.sample_track(track).write_sample(sample).await?;
        Ok(())
    }

    /// Forgets the sample track of `track_id` right away. Ended tracks are
    /// forgotten on their own.
    pub fn release(&self, track_id: &TrackId) {
        self.tracks.remove(track_id);
    }
}

fn shared_sample_track(
    tracks: &SampleTracks,
    track: &Arc<MediaTrack>,
) -> Arc<TrackLocalStaticSample> {
    let sample_track = match tracks.entry(track.id()) {
        Entry::Occupied(entry) => return entry.get().clone(),
        Entry::Vacant(entry) => {
            let mime_type = match track.kind() {
                TrackKind::Audio => MIME_TYPE_OPUS,
                TrackKind::Video => MIME_TYPE_VP8,
            };
            let sample_track = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: mime_type.to_owned(),
                    ..Default::default()
                },
                track.id().to_string(),
                STREAM_ID.to_owned(),
            ));
            entry.insert(sample_track.clone());
            sample_track
        }
    };

    forget_when_ended(tracks, track);
    sample_track
}

/// Drops the map entry of `track` once it ends or is dropped.
fn forget_when_ended(tracks: &SampleTracks, track: &MediaTrack) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        debug!("No runtime, sample track of {} needs an explicit release", track.id());
        return;
    };

    let tracks = Arc::downgrade(tracks);
    let track_id = track.id();
    let mut ended = track.subscribe_ended();
    runtime.spawn(async move {
        let _ = ended.wait_for(|ended| *ended).await;
        if let Some(tracks) = tracks.upgrade() {
            tracks.remove(&track_id);
            debug!("Released sample track of {}", track_id);
        }
    });
}

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn connect(
        &self,
        link: LinkKey,
        ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Result<Box<dyn PeerConnection>, ConnectionError> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let state_tx = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();

                Box::pin(async move {
                    info!(
                        "Peer connection state for {} changed: {:?}",
                        link.remote_id, s
                    );
                    let state = match s {
                        RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
                        RTCPeerConnectionState::Connected => ConnectionState::Connected,
                        RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
                        RTCPeerConnectionState::Failed => ConnectionState::Failed,
                        RTCPeerConnectionState::Closed => ConnectionState::Closed,
                        _ => ConnectionState::New,
                    };
                    let _ = tx.send(ConnectionEvent::StateChanged { link, state });
                })
            },
        ));

        let ice_tx = events;
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let _ = tx.send(ConnectionEvent::LocalCandidate {
                    link,
                    candidate: IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_m_line_index: init.sdp_mline_index,
                    },
                });
            })
        }));

        Ok(Box::new(WebRtcPeerConnection {
            remote_id: link.remote_id,
            peer_connection,
            tracks: self.tracks.clone(),
            senders: DashMap::new(),
            next_sender: AtomicU64::new(1),
            deferred_offer: Mutex::new(None),
        }))
    }
}

struct WebRtcPeerConnection {
    remote_id: ParticipantId,
    peer_connection: Arc<RTCPeerConnection>,
    tracks: SampleTracks,
    senders: DashMap<SenderId, Arc<RTCRtpSender>>,
    next_sender: AtomicU64,
    /// Renegotiation offer sent but not installed yet. The `webrtc` crate
    /// cannot roll back from have-local-offer, so the offer only becomes the
    /// local description once its answer is in.
    deferred_offer: Mutex<Option<RTCSessionDescription>>,
}

impl WebRtcPeerConnection {
    fn local_track(&self, track: &Arc<MediaTrack>) -> Arc<dyn TrackLocal + Send + Sync> {
        shared_sample_track(&self.tracks, track)
    }

    fn rtp_sender(&self, sender: SenderId) -> Result<Arc<RTCRtpSender>, ConnectionError> {
        self.senders
            .get(&sender)
            .map(|s| s.clone())
            .ok_or(ConnectionError::UnknownSender(sender.0))
    }
}

#[async_trait]
impl PeerConnection for WebRtcPeerConnection {
    async fn add_track(&self, track: &Arc<MediaTrack>) -> Result<SenderId, ConnectionError> {
        let rtp_sender = self.peer_connection.add_track(self.local_track(track)).await?;

        // RTCP has to be read for interceptors such as NACK to work.
        let rtcp_sender = rtp_sender.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while rtcp_sender.read(&mut buf).await.is_ok() {}
        });

        let id = SenderId(self.next_sender.fetch_add(1, Ordering::Relaxed));
        self.senders.insert(id, rtp_sender);
        debug!("Added {} as {} towards {}", track.label(), id, self.remote_id);
        Ok(id)
    }

    async fn replace_track(
        &self,
        sender: SenderId,
        track: &Arc<MediaTrack>,
    ) -> Result<ReplaceOutcome, ConnectionError> {
        let rtp_sender = self.rtp_sender(sender)?;
        match rtp_sender.replace_track(Some(self.local_track(track))).await {
            Ok(()) => Ok(ReplaceOutcome::Replaced),
            Err(e) => {
                warn!(
                    "In-place replace on {} towards {} failed: {}",
                    sender, self.remote_id, e
                );
                Err(e.into())
            }
        }
    }

    async fn remove_track(&self, sender: SenderId) -> Result<(), ConnectionError> {
        let Some((_, rtp_sender)) = self.senders.remove(&sender) else {
            return Err(ConnectionError::UnknownSender(sender.0));
        };
        self.peer_connection.remove_track(&rtp_sender).await?;
        Ok(())
    }

    async fn create_offer(&self) -> Result<String, ConnectionError> {
        let offer = self.peer_connection.create_offer(None).await?;
        let sdp = offer.sdp.clone();

        if self.peer_connection.current_local_description().await.is_some() {
            *self.deferred_offer.lock().await = Some(offer);
        } else {
            // First offer: installing it starts candidate gathering.
            self.peer_connection.set_local_description(offer).await?;
        }
        Ok(sdp)
    }

    async fn accept_offer(&self, sdp: String) -> Result<String, ConnectionError> {
        let desc = RTCSessionDescription::offer(sdp)?;
        self.peer_connection.set_remote_description(desc).await?;

        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(answer.sdp)
    }

    async fn accept_answer(&self, sdp: String) -> Result<(), ConnectionError> {
        if let Some(offer) = self.deferred_offer.lock().await.take() {
            self.peer_connection.set_local_description(offer).await?;
        }
        let desc = RTCSessionDescription::answer(sdp)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), ConnectionError> {
        match self.deferred_offer.lock().await.take() {
            Some(_) => {
                debug!("Dropped renegotiation offer towards {}", self.remote_id);
                Ok(())
            }
            None => Err(ConnectionError::Rejected(
                "no renegotiation offer to roll back".into(),
            )),
        }
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), ConnectionError> {
        self.peer_connection
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        self.senders.clear();
        self.peer_connection.close().await?;
        Ok(())
    }
}
