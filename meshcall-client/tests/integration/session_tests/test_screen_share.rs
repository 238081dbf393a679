use crate::utils::*;
use meshcall_client::{SessionError, SessionNotification};

#[tokio::test]
async fn test_screen_share_restores_camera() {
    init_tracing();
    let relay = LoopbackRelay::new();
    let a = relay.spawn_peer().await;
    let mut b = relay.spawn_peer().await;

    a.handle.join("R1", "alice").await.unwrap();
    b.handle.join("R1", "bob").await.unwrap();
    let before = wait_for_snapshot(&a.handle, SETTLE_TIMEOUT_MS, |s| {
        s.links.len() == 1 && s.all_stable()
    })
    .await;
    let camera = before.camera_track.unwrap();
    assert_eq!(before.link(&b.id).unwrap().video_track, Some(camera));

    let screen = a.handle.start_screen_share().await.unwrap();
    let sharing = a.handle.snapshot().await.unwrap();
    assert_eq!(sharing.screen_track, Some(screen));
    assert!(sharing.media.screen_sharing);
    assert_eq!(sharing.link(&b.id).unwrap().video_track, Some(screen));
    assert_eq!(sharing.camera_track, Some(camera));

    wait_for_notification(&mut b.notifications, SETTLE_TIMEOUT_MS, |n| {
        matches!(n, SessionNotification::PeerMediaChanged { state, .. } if state.screen_sharing)
    })
    .await;

    a.handle.stop_screen_share().await.unwrap();
    let after = a.handle.snapshot().await.unwrap();
    assert_eq!(after.screen_track, None);
    assert_eq!(after.link(&b.id).unwrap().video_track, Some(camera));
    assert!(a.media.last_screen().unwrap().is_ended());

    assert!(matches!(
        a.handle.stop_screen_share().await,
        Err(SessionError::NotSharing)
    ));
}

#[tokio::test]
async fn test_share_stops_when_source_ends() {
    init_tracing();
    let relay = LoopbackRelay::new();
    let mut a = relay.spawn_peer().await;
    let b = relay.spawn_peer().await;

    a.handle.join("R1", "alice").await.unwrap();
    b.handle.join("R1", "bob").await.unwrap();
    wait_for_snapshot(&a.handle, SETTLE_TIMEOUT_MS, |s| s.links.len() == 1 && s.all_stable())
        .await;

    a.handle.start_screen_share().await.unwrap();
    a.media.last_screen().unwrap().end();

    wait_for_notification(&mut a.notifications, SETTLE_TIMEOUT_MS, |n| {
        *n == SessionNotification::ScreenShareStopped
    })
    .await;
    let snapshot = a.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.screen_track, None);
    assert!(!snapshot.media.screen_sharing);
    assert_eq!(
        snapshot.link(&b.id).unwrap().video_track,
        snapshot.camera_track
    );
}

#[tokio::test]
async fn test_new_link_during_share_sends_screen() {
    init_tracing();
    let relay = LoopbackRelay::new();
    let a = relay.spawn_peer().await;
    let b = relay.spawn_peer().await;

    a.handle.join("R1", "alice").await.unwrap();
    let screen = a.handle.start_screen_share().await.unwrap();

    b.handle.join("R1", "bob").await.unwrap();
    let snapshot = wait_for_snapshot(&a.handle, SETTLE_TIMEOUT_MS, |s| {
        s.links.len() == 1 && s.all_stable()
    })
    .await;
    assert_eq!(snapshot.link(&b.id).unwrap().video_track, Some(screen));
}

#[tokio::test]
async fn test_share_requires_room() {
    init_tracing();
    let relay = LoopbackRelay::new();
    let a = relay.spawn_peer().await;

    assert!(matches!(
        a.handle.start_screen_share().await,
        Err(SessionError::NotInRoom)
    ));
}
