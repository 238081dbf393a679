mod relay_connection;
mod signal_sink;
mod webrtc_connector;

pub use relay_connection::*;
pub use signal_sink::*;
pub use webrtc_connector::*;
