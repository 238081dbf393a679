use crate::error::MediaError;
use crate::media::MediaTrack;
use async_trait::async_trait;
use std::sync::Arc;

/// Tracks handed over by the device layer when joining.
#[derive(Debug, Clone, Default)]
pub struct LocalMedia {
    pub microphone: Option<Arc<MediaTrack>>,
    pub camera: Option<Arc<MediaTrack>>,
}

/// Platform capture API. Lives outside this crate; the session only awaits it.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire_user_media(&self) -> Result<LocalMedia, MediaError>;

    async fn acquire_display_media(&self) -> Result<Arc<MediaTrack>, MediaError>;
}
