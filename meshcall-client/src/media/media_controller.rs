use crate::media::{LocalMedia, MediaTrack, TrackId, TrackKind};
use crate::peer::PeerConnectionManager;
use crate::session::SessionCommand;
use meshcall_core::MediaState;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Local audio, camera and screen tracks, and which of them every link sends.
///
/// Enable flags live on the shared tracks, so toggling needs no
/// renegotiation. Swapping camera and screen goes through
/// `PeerConnectionManager::replace_outgoing`, which walks all links in one
/// call; the session runs it to completion before handling anything else, so
/// a link opened afterwards starts from the new track set.
pub struct MediaTrackController {
    microphone: Option<Arc<MediaTrack>>,
    camera: Option<Arc<MediaTrack>>,
    screen: Option<Arc<MediaTrack>>,
    commands: mpsc::WeakUnboundedSender<SessionCommand>,
}

impl MediaTrackController {
    pub(crate) fn new(commands: mpsc::WeakUnboundedSender<SessionCommand>) -> Self {
        Self {
            microphone: None,
            camera: None,
            screen: None,
            commands,
        }
    }

    pub fn install(&mut self, media: LocalMedia) {
        self.microphone = media.microphone;
        self.camera = media.camera;
    }

    /// Stops every local track, e.g. after leaving the room.
    pub fn release(&mut self) {
        for track in [
            self.microphone.take(),
            self.camera.take(),
            self.screen.take(),
        ]
        .into_iter()
        .flatten()
        {
            track.end();
        }
    }

    /// Tracks a new link must start with.
    pub fn outgoing_tracks(&self) -> Vec<Arc<MediaTrack>> {
        self.microphone
            .iter()
            .chain(self.outgoing_video())
            .cloned()
            .collect()
    }

    pub fn outgoing_video(&self) -> Option<&Arc<MediaTrack>> {
        self.screen.as_ref().or(self.camera.as_ref())
    }

    pub fn camera_track_id(&self) -> Option<TrackId> {
        self.camera.as_ref().map(|t| t.id())
    }

    pub fn screen_track_id(&self) -> Option<TrackId> {
        self.screen.as_ref().map(|t| t.id())
    }

    pub fn is_sharing(&self) -> bool {
        self.screen.is_some()
    }

    pub fn media_state(&self) -> MediaState {
        MediaState {
            audio_enabled: self.microphone.as_ref().is_some_and(|t| t.is_enabled()),
            video_enabled: self.camera.as_ref().is_some_and(|t| t.is_enabled()),
            screen_sharing: self.is_sharing(),
        }
    }

    pub fn set_audio_enabled(&self, enabled: bool) -> MediaState {
        if let Some(track) = &self.microphone {
            track.set_enabled(enabled);
        }
        self.media_state()
    }

    pub fn set_video_enabled(&self, enabled: bool) -> MediaState {
        if let Some(track) = &self.camera {
            track.set_enabled(enabled);
        }
        self.media_state()
    }

    /// Sends `screen` instead of the camera on every link.
    pub async fn start_screen_share(
        &mut self,
        screen: Arc<MediaTrack>,
        peers: &mut PeerConnectionManager,
    ) {
        if let Some(previous) = self.screen.replace(screen.clone()) {
            previous.end();
        }

        let commands = self.commands.clone();
        let watched = screen.clone();
        tokio::spawn(async move {
            watched.wait_ended().await;
            if let Some(tx) = commands.upgrade() {
                let _ = tx.send(SessionCommand::ScreenTrackEnded {
                    track_id: watched.id(),
                });
            }
        });

        peers.replace_outgoing(TrackKind::Video, Some(&screen)).await;
        info!("Screen share {} started on {} link(s)", screen.id(), peers.link_count());
    }

    /// Puts the camera back on every link. Returns false when nothing was
    /// being shared.
    pub async fn stop_screen_share(&mut self, peers: &mut PeerConnectionManager) -> bool {
        let Some(screen) = self.screen.take() else {
            debug!("Stop requested without an active screen share");
            return false;
        };
        screen.end();

        peers
            .replace_outgoing(TrackKind::Video, self.camera.as_ref())
            .await;
        info!("Screen share {} stopped", screen.id());
        true
    }
}
