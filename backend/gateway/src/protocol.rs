//! WebSocket protocol for the chat relay.
//!
//! Every frame is a JSON text object tagged by `type`. The event names of
//! the old socket.io server (`add-user`, `send-msg`) are accepted as `type`
//! aliases inside this JSON envelope. This is not socket.io wire
//! compatibility: the id still travels as `{"userId": ...}` and the only
//! outbound event is `message-received`.

use chatrelay_core::{RelayError, RelayMessage, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client -> Server events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Bind this connection to a user id issued at login.
    #[serde(alias = "add-user")]
    RegisterIdentity {
        #[serde(rename = "userId", alias = "user_id")]
        user_id: UserId,
    },
    /// Forward `payload` to whichever connection currently represents `to`.
    #[serde(alias = "send-msg")]
    Send {
        to: UserId,
        #[serde(default, alias = "msg")]
        payload: Value,
    },
}

impl ClientEvent {
    /// Parse one inbound text frame.
    pub fn from_text(text: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Server -> Client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A payload relayed from another connection, passed through untouched.
    MessageReceived { payload: Value },
}

impl From<RelayMessage> for ServerEvent {
    fn from(msg: RelayMessage) -> Self {
        ServerEvent::MessageReceived {
            payload: msg.payload,
        }
    }
}
