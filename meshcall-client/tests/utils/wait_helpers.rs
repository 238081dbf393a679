use meshcall_client::{SessionHandle, SessionNotification, SessionSnapshot};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;

/// Timeout for a mesh to settle (ms).
pub const SETTLE_TIMEOUT_MS: u64 = 3000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Polls the session until `done` holds, panicking with the last snapshot on
/// timeout.
pub async fn wait_for_snapshot(
    handle: &SessionHandle,
    timeout_ms: u64,
    done: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let snapshot = handle.snapshot().await.expect("session is gone");
        if done(&snapshot) {
            return snapshot;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not reached, last snapshot: {:#?}", snapshot);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Waits for the first notification matching `wanted`, skipping others.
pub async fn wait_for_notification(
    rx: &mut mpsc::UnboundedReceiver<SessionNotification>,
    timeout_ms: u64,
    wanted: impl Fn(&SessionNotification) -> bool,
) -> SessionNotification {
    let result = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        while let Some(notification) = rx.recv().await {
            if wanted(&notification) {
                return Some(notification);
            }
        }
        None
    })
    .await;

    match result {
        Ok(Some(notification)) => notification,
        Ok(None) => panic!("notification channel closed"),
        Err(_) => panic!("timed out waiting for notification"),
    }
}

/// Everything already queued, without waiting.
pub fn drain_notifications(
    rx: &mut mpsc::UnboundedReceiver<SessionNotification>,
) -> Vec<SessionNotification> {
    let mut out = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        out.push(notification);
    }
    out
}
