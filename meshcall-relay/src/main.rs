use anyhow::{Context, Result};
use clap::Parser;
use meshcall_core::IceServerConfig;
use meshcall_relay::{DEFAULT_ROOM_CAPACITY, RelayConfig, serve};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "meshcall-relay", version, about = "Room-scoped signaling relay for full-mesh calls")]
struct Args {
    /// Address to accept WebSocket connections on.
    #[arg(long, env = "MESHCALL_LISTEN", default_value = "0.0.0.0:5201")]
    listen: SocketAddr,

    /// STUN/TURN url handed to clients; repeat or comma-separate. Defaults to public STUN.
    #[arg(long = "ice-server", env = "MESHCALL_ICE_SERVERS", value_delimiter = ',')]
    ice_servers: Vec<String>,

    #[arg(long, default_value_t = DEFAULT_ROOM_CAPACITY)]
    room_capacity: usize,
}

impl Args {
    fn into_config(self) -> RelayConfig {
        let mut config = RelayConfig {
            listen_addr: self.listen,
            room_capacity: self.room_capacity,
            ..RelayConfig::default()
        };
        if !self.ice_servers.is_empty() {
            config.ice_servers = self
                .ice_servers
                .into_iter()
                .map(|url| IceServerConfig {
                    urls: vec![url],
                    username: None,
                    credential: None,
                })
                .collect();
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Args::parse().into_config();
    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

    info!("Signaling relay listening on {}", config.listen_addr);
    serve(listener, &config).await.context("Relay server failed")
}
