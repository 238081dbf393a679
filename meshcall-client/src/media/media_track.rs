use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackSource {
    Microphone,
    Camera,
    Screen,
}

impl TrackSource {
    pub fn kind(self) -> TrackKind {
        match self {
            Self::Microphone => TrackKind::Audio,
            Self::Camera | Self::Screen => TrackKind::Video,
        }
    }
}

/// A local capture track. Every peer link sends the same track object, so
/// flipping `enabled` or ending it is seen by all links at once.
#[derive(Debug)]
pub struct MediaTrack {
    id: TrackId,
    source: TrackSource,
    label: String,
    enabled: AtomicBool,
    ended: watch::Sender<bool>,
}

impl MediaTrack {
    pub fn new(source: TrackSource, label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: TrackId::new(),
            source,
            label: label.into(),
            enabled: AtomicBool::new(true),
            ended: watch::Sender::new(false),
        })
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn source(&self) -> TrackSource {
        self.source
    }

    pub fn kind(&self) -> TrackKind {
        self.source.kind()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// A disabled track stays attached but produces silence / black frames.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Marks the source as finished, e.g. the user stopped sharing from the
    /// platform UI. Ending twice is a no-op.
    pub fn end(&self) {
        self.ended.send_if_modified(|ended| !std::mem::replace(ended, true));
    }

    pub fn is_ended(&self) -> bool {
        *self.ended.borrow()
    }

    /// Resolves once the track has ended.
    pub async fn wait_ended(&self) {
        let mut rx = self.subscribe_ended();
        let _ = rx.wait_for(|ended| *ended).await;
    }

    /// Watches the ended flag without keeping the track alive. The receiver
    /// errors once the track is dropped.
    pub fn subscribe_ended(&self) -> watch::Receiver<bool> {
        self.ended.subscribe()
    }
}
