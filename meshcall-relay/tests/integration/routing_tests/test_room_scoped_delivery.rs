use meshcall_core::{ParticipantId, SignalPayload};
use meshcall_relay::RelayError;

use crate::utils::{SIGNAL_TIMEOUT_MS, chat, create_test_registry, init_tracing, offer_to, room};

#[tokio::test]
async fn test_rooms_do_not_leak_into_each_other() {
    init_tracing();

    let (registry, output) = create_test_registry();
    let r1 = room("R1");
    let r2 = room("R2");
    let a = ParticipantId::new();
    let b = ParticipantId::new();
    let x = ParticipantId::new();
    let y = ParticipantId::new();

    registry.join(r1.clone(), a, "alice".into()).await.unwrap();
    registry.join(r1.clone(), b, "bob".into()).await.unwrap();
    registry.join(r2.clone(), x, "xavier".into()).await.unwrap();
    registry.join(r2.clone(), y, "yara".into()).await.unwrap();

    // Neither room heard about the other's joins.
    assert!(output.signals_for(&a).await.iter().all(|e| e.room_id == r1));
    assert!(output.signals_for(&x).await.iter().all(|e| e.room_id == r2));
    output.clear().await;

    // Addressing a member of another room fails before reaching any room.
    assert!(matches!(
        registry.route(a, offer_to(&r2, x, "v=0")).await,
        Err(RelayError::WrongRoom { .. })
    ));
    // A target outside the sender's room is dropped by the sender's room.
    registry.route(a, offer_to(&r1, x, "v=0")).await.unwrap();

    registry.route(a, chat(&r1, "hello r1")).await.unwrap();
    assert!(output.wait_for_total(1, SIGNAL_TIMEOUT_MS).await);

    let to_b = output.signals_for(&b).await;
    assert_eq!(to_b.len(), 1);
    assert!(matches!(&to_b[0].payload, SignalPayload::Chat { text, .. } if text == "hello r1"));
    assert!(output.messages_for(&x).await.is_empty());
    assert!(output.messages_for(&y).await.is_empty());
    assert_eq!(output.total().await, 1);
}

#[tokio::test]
async fn test_media_state_is_presence_for_the_room() {
    init_tracing();

    let (registry, output) = create_test_registry();
    let r1 = room("R1");
    let a = ParticipantId::new();
    let b = ParticipantId::new();

    registry.join(r1.clone(), a, "alice".into()).await.unwrap();
    registry.join(r1.clone(), b, "bob".into()).await.unwrap();
    output.clear().await;

    let muted = meshcall_core::MediaState {
        audio_enabled: false,
        video_enabled: true,
        screen_sharing: false,
    };
    registry.publish_media_state(a, muted).await.unwrap();
    assert!(output.wait_for_total(1, SIGNAL_TIMEOUT_MS).await);

    assert!(matches!(
        &output.messages_for(&b).await[0],
        meshcall_core::ServerMessage::MediaStateChanged { participant_id, state }
            if *participant_id == a && *state == muted
    ));

    let members = registry.members(&r1).await;
    let alice = members.iter().find(|m| m.id == a).unwrap();
    assert_eq!(alice.media, muted);
}
