//! Presence registry.
//!
//! Maps each online user to the one connection that currently represents
//! them. Last registration wins.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use chatrelay_core::{ConnectionId, UserId};

use crate::protocol::ServerEvent;

pub type ClientSender = mpsc::UnboundedSender<ServerEvent>;
pub type ClientReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Handle to one live connection's outbound queue.
///
/// Clones share the same connection. Equality is connection identity.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: ClientSender,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its writer task drains.
    pub fn channel() -> (Self, ClientReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = Self {
            id: ConnectionId::new(),
            sender,
        };
        (handle, receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an event for this connection. Returns false if the connection
    /// is already gone.
    pub fn deliver(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

/// Shared user id -> connection directory.
#[derive(Clone, Default)]
pub struct PresenceRegistry {
    entries: Arc<RwLock<HashMap<UserId, ConnectionHandle>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `handle` as the connection for `user_id`.
    ///
    /// Returns the handle it displaced, if any. The displaced connection is
    /// left open and is not told.
    pub async fn register(
        &self,
        user_id: UserId,
        handle: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        let mut w = self.entries.write().await;
        let previous = w.insert(user_id, handle);
        debug!(online = w.len(), "Presence entry registered");
        previous
    }

    /// Current connection for `user_id`, if online.
    pub async fn lookup(&self, user_id: &UserId) -> Option<ConnectionHandle> {
        let r = self.entries.read().await;
        r.get(user_id).cloned()
    }

    /// Remove the entry for `user_id`, but only while it still points at
    /// `handle`.
    pub async fn remove(&self, user_id: &UserId, handle: &ConnectionHandle) -> bool {
        let mut w = self.entries.write().await;
        match w.get(user_id) {
            Some(current) if current == handle => {
                w.remove(user_id);
                debug!(online = w.len(), "Presence entry removed");
                true
            }
            _ => false,
        }
    }

    /// Number of users currently online.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
