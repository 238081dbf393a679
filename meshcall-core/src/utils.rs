use crate::model::IceServerConfig;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_3: &str = "stun:stun2.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_4: &str = "stun:stun3.l.google.com:19302";

/// Public STUN servers handed out when nothing else is configured.
pub fn default_ice_servers() -> Vec<IceServerConfig> {
    vec![IceServerConfig {
        urls: vec![
            DEFAULT_STUN_ADDR.to_owned(),
            DEFAULT_STUN_ADDR_2.to_owned(),
            DEFAULT_STUN_ADDR_3.to_owned(),
            DEFAULT_STUN_ADDR_4.to_owned(),
        ],
        username: None,
        credential: None,
    }]
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
