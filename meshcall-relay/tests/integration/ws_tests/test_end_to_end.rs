use futures::{SinkExt, StreamExt};
use meshcall_core::{ClientMessage, ErrorCode, ParticipantId, ServerMessage, SignalPayload};
use meshcall_relay::{RelayConfig, serve};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::utils::{init_tracing, offer_to, room};

type Ws = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_relay() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = RelayConfig::default();
    tokio::spawn(async move { serve(listener, &config).await });
    format!("ws://{}/ws", addr)
}

async fn send(ws: &mut Ws, message: &ClientMessage) {
    let json = serde_json::to_string(message).unwrap();
    ws.send(Message::Text(json.into())).await.unwrap();
}

async fn recv(ws: &mut Ws) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for relay")
            .expect("relay closed the socket")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn welcome(ws: &mut Ws) -> ParticipantId {
    match recv(ws).await {
        ServerMessage::Welcome {
            participant_id,
            ice_servers,
        } => {
            assert!(!ice_servers.is_empty());
            participant_id
        }
        other => panic!("expected welcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_two_clients_exchange_offer_over_websocket() {
    init_tracing();

    let url = start_relay().await;
    let r1 = room("R1");

    let (mut alice, _) = connect_async(url.as_str()).await.unwrap();
    let alice_id = welcome(&mut alice).await;
    send(
        &mut alice,
        &ClientMessage::Join {
            room_id: r1.clone(),
            display_name: "alice".into(),
        },
    )
    .await;
    assert!(matches!(recv(&mut alice).await, ServerMessage::Joined { members, .. } if members.is_empty()));

    let (mut bob, _) = connect_async(url.as_str()).await.unwrap();
    let bob_id = welcome(&mut bob).await;
    send(
        &mut bob,
        &ClientMessage::Join {
            room_id: r1.clone(),
            display_name: "bob".into(),
        },
    )
    .await;
    match recv(&mut bob).await {
        ServerMessage::Joined { members, .. } => {
            assert_eq!(members.len(), 1);
            assert_eq!(members[0].id, alice_id);
        }
        other => panic!("expected joined, got {:?}", other),
    }

    match recv(&mut alice).await {
        ServerMessage::Signal(envelope) => {
            assert_eq!(envelope.from_id, Some(bob_id));
            assert!(matches!(envelope.payload, SignalPayload::Join { .. }));
        }
        other => panic!("expected join notice, got {:?}", other),
    }

    send(&mut alice, &ClientMessage::Signal(offer_to(&r1, bob_id, "v=0"))).await;
    match recv(&mut bob).await {
        ServerMessage::Signal(envelope) => {
            assert_eq!(envelope.from_id, Some(alice_id));
            assert!(matches!(envelope.payload, SignalPayload::Offer { .. }));
        }
        other => panic!("expected offer, got {:?}", other),
    }

    bob.send(Message::Text("not json".into())).await.unwrap();
    assert!(matches!(
        recv(&mut bob).await,
        ServerMessage::Error { code: ErrorCode::InvalidMessage, .. }
    ));

    drop(bob);
    match recv(&mut alice).await {
        ServerMessage::Signal(envelope) => {
            assert_eq!(envelope.from_id, Some(bob_id));
            assert_eq!(envelope.payload, SignalPayload::Leave);
        }
        other => panic!("expected leave notice, got {:?}", other),
    }
}
