mod signaling_output;
mod signaling_service;
mod ws_connections;
mod ws_handler;

pub use signaling_output::*;
pub use signaling_service::*;
pub use ws_connections::*;
pub use ws_handler::*;
