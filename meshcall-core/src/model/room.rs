use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProtocolError;

const MAX_ROOM_ID_LEN: usize = 64;

/// Human-chosen room name, trimmed and bounded.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ProtocolError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_ROOM_ID_LEN {
            return Err(ProtocolError::InvalidRoomId(raw.as_ref().to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RoomId> for String {
    fn from(value: RoomId) -> Self {
        value.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
