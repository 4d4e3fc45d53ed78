use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RelayError;

/// Identifier of a user, issued by the authentication service.
///
/// The relay trusts the value as given. The only constraint is that it is
/// not empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Build a user id, rejecting empty input.
    pub fn parse(raw: impl Into<String>) -> Result<Self, RelayError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(RelayError::InvalidUserId(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = RelayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one live connection. Used to tell handles apart and to
/// correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message to forward to a single recipient. Exists only while it is
/// being relayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayMessage {
    pub to: UserId,
    pub payload: serde_json::Value,
}

impl RelayMessage {
    pub fn new(to: UserId, payload: serde_json::Value) -> Self {
        Self { to, payload }
    }
}
