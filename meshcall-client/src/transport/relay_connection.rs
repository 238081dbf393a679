use crate::error::SessionError;
use crate::transport::SignalSink;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use meshcall_core::{ClientMessage, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// WebSocket to the relay, split into a sink and a stream of server messages.
/// The stream ends when the socket closes.
pub struct RelayConnection {
    pub sink: Arc<dyn SignalSink>,
    pub incoming: mpsc::UnboundedReceiver<ServerMessage>,
}

struct WsSignalSink {
    tx: mpsc::UnboundedSender<Message>,
}

#[async_trait]
impl SignalSink for WsSignalSink {
    async fn send(&self, message: ClientMessage) -> Result<(), SessionError> {
        let json = serde_json::to_string(&message)?;
        self.tx
            .send(Message::Text(json.into()))
            .map_err(|_| SessionError::RelayClosed)
    }
}

pub async fn connect_relay(url: &str) -> Result<RelayConnection, SessionError> {
    let (ws_stream, _) = connect_async(url).await?;
    info!("Connected to relay at {}", url);

    let (mut write, mut read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
    let (in_tx, in_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = write.send(msg).await {
                error!("Failed to write to relay: {:?}", e);
                break;
            }
        }
        let _ = write.close().await;
    });

    tokio::spawn(async move {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(text.as_str()) {
                    Ok(message) => {
                        if in_tx.send(message).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Invalid ServerMessage from relay: {}", e),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("Relay socket error: {:?}", e);
                    break;
                }
            }
        }
        debug!("Relay read loop finished");
    });

    Ok(RelayConnection {
        sink: Arc::new(WsSignalSink { tx: out_tx }),
        incoming: in_rx,
    })
}
