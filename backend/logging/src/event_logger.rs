//! Relay Event Logger
//!
//! Presence and relay lifecycle events, emitted as structured records on
//! the `relay_events` target. Payloads are never logged, only their size.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    Registered {
        user_id: String,
        displaced_connection: Option<String>,
    },
    Forwarded {
        to: String,
        payload_bytes: usize,
    },
    RecipientOffline {
        to: String,
    },
    Disconnected {
        user_id: Option<String>,
        presence_removed: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub connection_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: RelayEvent,
}

pub struct RelayEventLogger;

impl RelayEventLogger {
    /// Log a relay event for the given connection.
    pub fn log_event(connection_id: &str, event: RelayEvent) {
        let entry = EventLogEntry {
            connection_id: connection_id.into(),
            timestamp: Utc::now(),
            event,
        };

        match serde_json::to_string(&entry) {
            Ok(json) => info!(target: "relay_events", event = %json, "Relay event"),
            Err(_) => info!(target: "relay_events", event = ?entry, "Relay event"),
        }
    }
}
