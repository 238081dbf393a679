use meshcall_core::IceServerConfig;
use meshcall_core::utils::default_ice_servers;
use std::net::{Ipv4Addr, SocketAddr};

pub const DEFAULT_PORT: u16 = 5201;
pub const DEFAULT_ROOM_CAPACITY: usize = 100;

/// Runtime settings of the relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub listen_addr: SocketAddr,
    /// Handed to every client in `welcome`; the relay itself never uses them.
    pub ice_servers: Vec<IceServerConfig>,
    /// Depth of each room's command queue.
    pub room_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            ice_servers: default_ice_servers(),
            room_capacity: DEFAULT_ROOM_CAPACITY,
        }
    }
}
