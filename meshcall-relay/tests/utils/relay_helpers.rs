use meshcall_core::{ParticipantId, RoomId, SignalEnvelope, SignalPayload};
use meshcall_relay::{RelayConfig, RoomRegistry, SignalingService};
use std::sync::Arc;
use tracing::Level;

use super::mock_signaling::MockSignalingOutput;

/// Timeout for asynchronously routed signals (ms).
pub const SIGNAL_TIMEOUT_MS: u64 = 2000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn room(name: &str) -> RoomId {
    RoomId::parse(name).unwrap()
}

pub fn create_test_registry() -> (RoomRegistry, MockSignalingOutput) {
    let output = MockSignalingOutput::new();
    let registry = RoomRegistry::new(Arc::new(output.clone()), 16);
    (registry, output)
}

pub fn create_test_service() -> (SignalingService, MockSignalingOutput) {
    let output = MockSignalingOutput::new();
    let service = SignalingService::new(Arc::new(output.clone()), &RelayConfig::default());
    (service, output)
}

pub fn offer_to(room_id: &RoomId, to: ParticipantId, sdp: &str) -> SignalEnvelope {
    SignalEnvelope::targeted(
        room_id.clone(),
        to,
        SignalPayload::Offer {
            sdp: sdp.to_owned(),
            renegotiation: false,
        },
    )
}

pub fn chat(room_id: &RoomId, text: &str) -> SignalEnvelope {
    SignalEnvelope::room_wide(
        room_id.clone(),
        SignalPayload::Chat {
            text: text.to_owned(),
            sent_at_ms: 0,
        },
    )
}
