//! Mesh video calls: a signaling relay and the client session that talks to it.
//!
//! Enable `server` for the relay, `client` for the session, or `full` for both.
//! The wire model is always available.
//!
//! ```ignore
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! meshcall::serve(listener, &meshcall::RelayConfig::default()).await?;
//! ```

pub use meshcall_core::model::{ClientMessage, ParticipantId, RoomId, ServerMessage};

pub mod model {
    pub use meshcall_core::model::*;
}

#[cfg(feature = "server")]
pub use meshcall_relay::{RelayConfig, serve};

#[cfg(feature = "server")]
pub mod server {
    pub use meshcall_relay::*;
}

#[cfg(feature = "client")]
pub use meshcall_client::{
    MeshSession, SessionConfig, SessionHandle, SessionNotification, WebRtcConnector,
    connect_relay,
};

#[cfg(feature = "client")]
pub mod client {
    pub use meshcall_client::*;
}
