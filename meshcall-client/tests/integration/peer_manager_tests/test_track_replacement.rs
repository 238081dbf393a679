use super::test_negotiation_paths::{manager_fixture, offer};
use crate::utils::*;
use meshcall_client::{MediaTrack, ReplaceOutcome, TrackKind, TrackSource};
use meshcall_core::{ParticipantId, SignalPayload};

#[tokio::test]
async fn test_replace_outgoing_swaps_every_link_in_place() {
    init_tracing();
    let mut fx = manager_fixture();
    let (a, b) = (ParticipantId::new(), ParticipantId::new());
    for remote in [a, b] {
        fx.manager
            .handle_signal(offer(&fx.room, remote, false), &fx.tracks)
            .await
            .unwrap();
    }
    let answers = fx.sink.signals().await.len();

    let screen = MediaTrack::new(TrackSource::Screen, "screen");
    fx.manager
        .replace_outgoing(TrackKind::Video, Some(&screen))
        .await;

    for remote in [a, b] {
        let link = fx.manager.link(&remote).unwrap();
        assert_eq!(link.outgoing_track(TrackKind::Video), Some(screen.id()));
        assert_eq!(link.outgoing_track(TrackKind::Audio), Some(fx.tracks[0].id()));
        assert!(fx
            .connector
            .connection_to(&remote)
            .unwrap()
            .sent_tracks()
            .contains(&screen.id()));
    }
    assert_eq!(fx.sink.signals().await.len(), answers);

    let camera = fx.tracks[1].clone();
    fx.manager
        .replace_outgoing(TrackKind::Video, Some(&camera))
        .await;
    for remote in [a, b] {
        let link = fx.manager.link(&remote).unwrap();
        assert_eq!(link.outgoing_track(TrackKind::Video), Some(camera.id()));
    }
}

#[tokio::test]
async fn test_replace_outgoing_renegotiates_when_required() {
    init_tracing();
    let mut fx = manager_fixture();
    let (a, b) = (ParticipantId::new(), ParticipantId::new());
    for remote in [a, b] {
        fx.manager
            .handle_signal(offer(&fx.room, remote, false), &fx.tracks)
            .await
            .unwrap();
    }
    fx.connector
        .connection_to(&b)
        .unwrap()
        .set_replace_outcome(ReplaceOutcome::RenegotiationRequired);
    let before = fx.sink.signals().await.len();

    let screen = MediaTrack::new(TrackSource::Screen, "screen");
    fx.manager
        .replace_outgoing(TrackKind::Video, Some(&screen))
        .await;

    let signals = fx.sink.signals().await;
    let offers: Vec<_> = signals[before..]
        .iter()
        .filter(|s| matches!(s.payload, SignalPayload::Offer { renegotiation: true, .. }))
        .collect();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].to_id, Some(b));
}

#[tokio::test]
async fn test_removing_a_slot_renegotiates() {
    init_tracing();
    let mut fx = manager_fixture();
    let remote = ParticipantId::new();
    fx.manager
        .handle_signal(offer(&fx.room, remote, false), &fx.tracks)
        .await
        .unwrap();

    fx.manager.replace_outgoing(TrackKind::Video, None).await;

    let link = fx.manager.link(&remote).unwrap();
    assert_eq!(link.outgoing_track(TrackKind::Video), None);
    let last = fx.sink.signals().await.pop().unwrap();
    assert!(matches!(last.payload, SignalPayload::Offer { renegotiation: true, .. }));
}
