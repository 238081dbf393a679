mod connection;
mod peer_link;
mod peer_manager;
mod reorder_buffer;

pub use connection::*;
pub use peer_link::*;
pub use peer_manager::*;
pub use reorder_buffer::*;
