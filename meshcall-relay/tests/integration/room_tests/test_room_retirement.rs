use meshcall_core::ParticipantId;
use std::time::Duration;

use crate::utils::{create_test_registry, init_tracing, room};

#[tokio::test]
async fn test_empty_room_is_retired_and_recreated() {
    init_tracing();

    let (registry, _output) = create_test_registry();
    let a = ParticipantId::new();
    let b = ParticipantId::new();

    registry.join(room("R1"), a, "alice".into()).await.unwrap();
    assert_eq!(registry.room_count(), 1);

    registry.leave(a).await;

    let mut retired = false;
    for _ in 0..100 {
        if registry.room_count() == 0 {
            retired = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(retired, "empty room should close");

    let outcome = registry.join(room("R1"), b, "bob".into()).await.unwrap();
    assert!(outcome.members.is_empty());
    assert_eq!(registry.room_count(), 1);
}

#[tokio::test]
async fn test_join_racing_retirement_lands_in_a_live_room() {
    init_tracing();

    let (registry, _output) = create_test_registry();

    for round in 0..20 {
        let a = ParticipantId::new();
        let b = ParticipantId::new();
        registry.join(room("R1"), a, "alice".into()).await.unwrap();

        let leaving = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.leave(a).await })
        };
        let joining = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.join(room("R1"), b, "bob".into()).await })
        };

        leaving.await.unwrap();
        joining.await.unwrap().unwrap_or_else(|e| panic!("round {}: {}", round, e));

        let members = registry.members(&room("R1")).await;
        assert_eq!(members.len(), 1, "round {}", round);
        assert_eq!(members[0].id, b);

        registry.leave(b).await;
    }
}
