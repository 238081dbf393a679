use crate::error::SessionError;
use crate::media::TrackId;
use crate::session::{SessionCommand, SessionSnapshot};
use meshcall_core::{MediaState, ParticipantId, ParticipantInfo, RoomId};
use tokio::sync::{mpsc, oneshot};

/// Cloneable front of a running `MeshSession`. Every call is a request to the
/// session task; `SessionError::Closed` means the task is gone.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<SessionCommand>) -> Self {
        Self { commands }
    }

    /// Acquires camera and microphone, then joins `room`. Resolves with the
    /// members that were already present.
    pub async fn join(
        &self,
        room: &str,
        display_name: &str,
    ) -> Result<Vec<ParticipantInfo>, SessionError> {
        let room_id = RoomId::parse(room)?;
        let display_name = display_name.to_owned();
        self.request(|reply| SessionCommand::Join {
            room_id,
            display_name,
            reply,
        })
        .await?
    }

    /// Returns the room that was left, `None` if there was none.
    pub async fn leave(&self) -> Result<Option<RoomId>, SessionError> {
        self.request(|reply| SessionCommand::Leave { reply }).await
    }

    pub async fn set_audio_enabled(&self, enabled: bool) -> Result<MediaState, SessionError> {
        self.request(|reply| SessionCommand::SetAudioEnabled { enabled, reply })
            .await
    }

    pub async fn set_video_enabled(&self, enabled: bool) -> Result<MediaState, SessionError> {
        self.request(|reply| SessionCommand::SetVideoEnabled { enabled, reply })
            .await
    }

    pub async fn start_screen_share(&self) -> Result<TrackId, SessionError> {
        self.request(|reply| SessionCommand::StartScreenShare { reply })
            .await?
    }

    pub async fn stop_screen_share(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::StopScreenShare { reply })
            .await?
    }

    /// Room-wide when `to` is `None`.
    pub async fn send_chat(
        &self,
        text: &str,
        to: Option<ParticipantId>,
    ) -> Result<(), SessionError> {
        let text = text.to_owned();
        self.request(|reply| SessionCommand::SendChat { text, to, reply })
            .await?
    }

    pub async fn renegotiate(&self, remote_id: ParticipantId) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Renegotiate { remote_id, reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }

    /// Leaves the room if needed and stops the session task.
    pub fn close(&self) {
        let _ = self.commands.send(SessionCommand::Close);
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)
    }
}
