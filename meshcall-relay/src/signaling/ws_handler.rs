use crate::config::RelayConfig;
use crate::signaling::{SignalingService, WsConnections};
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use meshcall_core::{ClientMessage, ParticipantId};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub service: SignalingService,
    pub connections: Arc<WsConnections>,
}

impl AppState {
    pub fn new(config: &RelayConfig) -> Self {
        let connections = Arc::new(WsConnections::default());
        Self {
            service: SignalingService::new(connections.clone(), config),
            connections,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, config: &RelayConfig) -> std::io::Result<()> {
    let app = router(AppState::new(config));
    axum::serve(listener, app).await
}

async fn health() -> &'static str {
    "ok"
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let participant_id = ParticipantId::new();
    info!("New WebSocket connection: {}", participant_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    state.connections.add(participant_id, tx);
    state.service.on_connected(participant_id).await;

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = state.service.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                        Ok(message) => service.handle_message(participant_id, message).await,
                        Err(e) => {
                            warn!("Invalid ClientMessage from {}: {}", participant_id, e);
                            service.reject_malformed(participant_id, e.to_string()).await;
                        }
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    state.service.on_disconnected(participant_id).await;
    state.connections.remove(&participant_id);
    info!("WebSocket disconnected: {}", participant_id);
}
