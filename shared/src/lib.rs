use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// WebSocket messages for canvas relay and presence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    // Client -> Server
    Join {
        room_id: RoomId,
        display_name: DisplayName,
    },
    CanvasUpdate {
        room_id: RoomId,
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<ConnectionId>,
    },
    RequestResync {
        room_id: RoomId,
    },

    // Server -> Client
    Connected {
        connection_id: ConnectionId,
    },
    Occupancy {
        count: usize,
    },
    Roster {
        names: Vec<DisplayName>,
    },
    Canvas {
        data: String,
    },
    SnapshotRequest {
        to: ConnectionId,
    },
}

/// A validated room ID (opaque caller-supplied token)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Get the room ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct RoomIdError(String);

impl fmt::Display for RoomIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RoomIdError {}

impl FromStr for RoomId {
    type Err = RoomIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(RoomIdError("Room ID must not be empty".to_string()));
        }

        if trimmed.len() > 64 {
            return Err(RoomIdError(
                "Room ID must be at most 64 characters".to_string(),
            ));
        }

        if trimmed.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(RoomIdError(
                "Room ID must not contain whitespace or control characters".to_string(),
            ));
        }

        Ok(RoomId(trimmed.to_string()))
    }
}

impl TryFrom<String> for RoomId {
    type Error = RoomIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RoomId> for String {
    fn from(r: RoomId) -> Self {
        r.0
    }
}

impl AsRef<str> for RoomId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A server-issued connection ID
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Get the connection ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionIdError(String);

impl fmt::Display for ConnectionIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConnectionIdError {}

impl FromStr for ConnectionId {
    type Err = ConnectionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(ConnectionIdError(
                "Connection ID must not be empty".to_string(),
            ));
        }

        if trimmed.len() > 64 {
            return Err(ConnectionIdError(
                "Connection ID must be at most 64 characters".to_string(),
            ));
        }

        Ok(ConnectionId(trimmed.to_string()))
    }
}

impl TryFrom<String> for ConnectionId {
    type Error = ConnectionIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ConnectionId> for String {
    fn from(c: ConnectionId) -> Self {
        c.0
    }
}

impl AsRef<str> for ConnectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A validated display name (2-32 alphanumeric characters)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Get the display name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct DisplayNameError(String);

impl fmt::Display for DisplayNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for DisplayNameError {}

impl FromStr for DisplayName {
    type Err = DisplayNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if trimmed.len() < 2 {
            return Err(DisplayNameError(
                "Display name must be at least 2 characters".to_string(),
            ));
        }

        if trimmed.len() > 32 {
            return Err(DisplayNameError(
                "Display name must be at most 32 characters".to_string(),
            ));
        }

        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DisplayNameError(
                "Display name must contain only letters and numbers".to_string(),
            ));
        }

        Ok(DisplayName(trimmed.to_string()))
    }
}

impl TryFrom<String> for DisplayName {
    type Error = DisplayNameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DisplayName> for String {
    fn from(n: DisplayName) -> Self {
        n.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Response from GET /api/rooms/:id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInfoResponse {
    pub exists: bool,
    pub has_creator: bool,
    pub occupancy: usize,
}
