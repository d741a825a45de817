use serde::{Deserialize, Serialize};
use std::fmt;

/// Shareable code of a friends room.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomCode {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RoomCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a session is attached to the rendezvous server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomMode {
    /// Mesh call inside a room identified by a code.
    Room(RoomCode),
    /// Unattached 1:1 call with whoever the server pairs us with.
    Random,
}

impl RoomMode {
    pub fn from_code(code: Option<RoomCode>) -> Self {
        match code {
            Some(code) => Self::Room(code),
            None => Self::Random,
        }
    }

    pub fn is_random(&self) -> bool {
        matches!(self, Self::Random)
    }
}
