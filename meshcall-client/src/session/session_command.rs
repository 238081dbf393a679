use crate::error::{MediaError, SessionError};
use crate::media::{LocalMedia, MediaTrack, TrackId};
use crate::session::SessionSnapshot;
use meshcall_core::{MediaState, ParticipantId, ParticipantInfo, RoomId};
use std::sync::Arc;
use tokio::sync::oneshot;

pub type Reply<T> = oneshot::Sender<T>;

/// Work items of the session task. Most come from a `SessionHandle`; the
/// `*Ready` and `ScreenTrackEnded` ones are posted by tasks the session
/// spawned itself.
#[derive(Debug)]
pub enum SessionCommand {
    Join {
        room_id: RoomId,
        display_name: String,
        reply: Reply<Result<Vec<ParticipantInfo>, SessionError>>,
    },
    UserMediaReady {
        room_id: RoomId,
        display_name: String,
        media: Result<LocalMedia, MediaError>,
        reply: Reply<Result<Vec<ParticipantInfo>, SessionError>>,
    },
    Leave {
        reply: Reply<Option<RoomId>>,
    },
    SetAudioEnabled {
        enabled: bool,
        reply: Reply<MediaState>,
    },
    SetVideoEnabled {
        enabled: bool,
        reply: Reply<MediaState>,
    },
    StartScreenShare {
        reply: Reply<Result<TrackId, SessionError>>,
    },
    DisplayMediaReady {
        media: Result<Arc<MediaTrack>, MediaError>,
        reply: Reply<Result<TrackId, SessionError>>,
    },
    StopScreenShare {
        reply: Reply<Result<(), SessionError>>,
    },
    ScreenTrackEnded {
        track_id: TrackId,
    },
    SendChat {
        text: String,
        to: Option<ParticipantId>,
        reply: Reply<Result<(), SessionError>>,
    },
    Renegotiate {
        remote_id: ParticipantId,
        reply: Reply<Result<(), SessionError>>,
    },
    Snapshot {
        reply: Reply<SessionSnapshot>,
    },
    Close,
}
