use super::test_negotiation_paths::{ManagerFixture, manager_fixture};
use crate::utils::*;
use meshcall_client::NegotiationState;
use meshcall_core::ParticipantId;

struct Side {
    id: ParticipantId,
    fx: ManagerFixture,
    delivered: usize,
}

fn side(id: ParticipantId) -> Side {
    let mut fx = manager_fixture();
    fx.manager.set_local_id(id);
    Side {
        id,
        fx,
        delivered: 0,
    }
}

/// Hands everything `from` sent since the last call to `to`. Returns how many
/// envelopes moved.
async fn forward(from: &mut Side, to: &mut Side) -> usize {
    let signals = from.fx.sink.signals().await;
    let fresh: Vec<_> = signals[from.delivered..].to_vec();
    from.delivered = signals.len();

    for envelope in &fresh {
        to.fx
            .manager
            .handle_signal(envelope.clone().stamped(from.id), &to.fx.tracks)
            .await
            .unwrap();
    }
    fresh.len()
}

async fn settle(a: &mut Side, b: &mut Side) {
    for _ in 0..10 {
        let moved = forward(a, b).await + forward(b, a).await;
        if moved == 0 {
            return;
        }
    }
    panic!("signals kept flowing");
}

fn ordered_ids() -> (ParticipantId, ParticipantId) {
    let (x, y) = (ParticipantId::new(), ParticipantId::new());
    if x < y { (x, y) } else { (y, x) }
}

fn link_state(side: &Side, remote: &Side) -> NegotiationState {
    side.fx.manager.link(&remote.id).unwrap().state()
}

#[tokio::test]
async fn test_politeness_follows_ids() {
    init_tracing();
    let (low, high) = ordered_ids();

    let unknown = manager_fixture();
    assert!(!unknown.manager.is_polite_towards(&high));

    let polite = side(low);
    let impolite = side(high);
    assert!(polite.fx.manager.is_polite_towards(&high));
    assert!(!impolite.fx.manager.is_polite_towards(&low));
}

#[tokio::test]
async fn test_crossing_renegotiations_both_settle() {
    init_tracing();
    let (low, high) = ordered_ids();
    let mut polite = side(low);
    let mut impolite = side(high);

    polite
        .fx
        .manager
        .connect_to(impolite.id, &polite.fx.tracks)
        .await
        .unwrap();
    settle(&mut polite, &mut impolite).await;
    assert_eq!(link_state(&polite, &impolite), NegotiationState::Stable);
    assert_eq!(link_state(&impolite, &polite), NegotiationState::Stable);

    polite.fx.manager.renegotiate(impolite.id).await.unwrap();
    impolite.fx.manager.renegotiate(polite.id).await.unwrap();
    assert_eq!(link_state(&polite, &impolite), NegotiationState::Offering);
    assert_eq!(link_state(&impolite, &polite), NegotiationState::Offering);

    settle(&mut polite, &mut impolite).await;

    assert_eq!(link_state(&polite, &impolite), NegotiationState::Stable);
    assert_eq!(link_state(&impolite, &polite), NegotiationState::Stable);

    let towards_impolite = polite.fx.connector.connection_to(&impolite.id).unwrap();
    let towards_polite = impolite.fx.connector.connection_to(&polite.id).unwrap();
    assert_eq!(towards_impolite.rollbacks(), 1);
    assert_eq!(towards_polite.rollbacks(), 0);
    // Initial offer, the rolled back one, and the one sent after answering.
    assert_eq!(towards_impolite.offers(), 3);
    assert_eq!(towards_impolite.answers(), 1);
    assert_eq!(towards_polite.answers(), 2);

    // The link keeps working afterwards.
    impolite.fx.manager.renegotiate(polite.id).await.unwrap();
    settle(&mut polite, &mut impolite).await;
    assert_eq!(link_state(&polite, &impolite), NegotiationState::Stable);
    assert_eq!(link_state(&impolite, &polite), NegotiationState::Stable);
    assert_eq!(towards_impolite.answers(), 2);
}

#[tokio::test]
async fn test_impolite_side_ignores_crossing_offer() {
    init_tracing();
    let (low, high) = ordered_ids();
    let mut polite = side(low);
    let mut impolite = side(high);

    impolite
        .fx
        .manager
        .connect_to(polite.id, &impolite.fx.tracks)
        .await
        .unwrap();
    settle(&mut impolite, &mut polite).await;

    impolite.fx.manager.renegotiate(polite.id).await.unwrap();
    polite.fx.manager.renegotiate(impolite.id).await.unwrap();

    // Only the polite offer reaches the impolite side so far.
    assert_eq!(forward(&mut polite, &mut impolite).await, 1);
    assert_eq!(link_state(&impolite, &polite), NegotiationState::Offering);
    let towards_polite = impolite.fx.connector.connection_to(&polite.id).unwrap();
    assert_eq!(towards_polite.rollbacks(), 0);
    assert_eq!(towards_polite.answers(), 0);

    settle(&mut impolite, &mut polite).await;
    assert_eq!(link_state(&polite, &impolite), NegotiationState::Stable);
    assert_eq!(link_state(&impolite, &polite), NegotiationState::Stable);
}
