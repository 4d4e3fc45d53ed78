//! Per-connection relay session.
//!
//! One `RelaySession` exists per live connection. It owns the connection's
//! handle, reacts to `ClientEvent`s, and cleans up presence on close.
//! Delivery is at-most-once: no acknowledgements, no retries.

use chatrelay_core::{RelayError, RelayMessage, UserId};
use chatrelay_logging::{RelayEvent, RelayEventLogger};
use tracing::{debug, warn};

use crate::presence::{ConnectionHandle, PresenceRegistry};
use crate::protocol::{ClientEvent, ServerEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no identity registered yet.
    Connected,
    Identified(UserId),
    Closed,
}

/// What a single inbound event did.
#[derive(Debug)]
pub enum RelayOutcome {
    Registered(UserId),
    /// Payload queued on the recipient's connection.
    Forwarded { to: UserId },
    /// Recipient not online; payload dropped.
    RecipientOffline { to: UserId },
    /// Event discarded without effect.
    Ignored(RelayError),
}

pub struct RelaySession {
    handle: ConnectionHandle,
    registry: PresenceRegistry,
    state: SessionState,
}

impl RelaySession {
    pub fn new(registry: PresenceRegistry, handle: ConnectionHandle) -> Self {
        Self {
            handle,
            registry,
            state: SessionState::Connected,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match &self.state {
            SessionState::Identified(user_id) => Some(user_id),
            _ => None,
        }
    }

    /// Handle one raw text frame. Malformed frames are logged and ignored.
    pub async fn handle_text(&mut self, text: &str) -> RelayOutcome {
        match ClientEvent::from_text(text) {
            Ok(event) => self.dispatch(event).await,
            Err(e) => {
                warn!(connection_id = %self.handle.id(), error = %e, "Ignoring malformed event");
                RelayOutcome::Ignored(e)
            }
        }
    }

    pub async fn dispatch(&mut self, event: ClientEvent) -> RelayOutcome {
        if self.state == SessionState::Closed {
            return RelayOutcome::Ignored(RelayError::SessionClosed);
        }

        match event {
            ClientEvent::RegisterIdentity { user_id } => self.register_identity(user_id).await,
            ClientEvent::Send { to, payload } => self.relay(RelayMessage::new(to, payload)).await,
        }
    }

    async fn register_identity(&mut self, user_id: UserId) -> RelayOutcome {
        if let SessionState::Identified(previous) = &self.state {
            if *previous != user_id {
                self.registry.remove(previous, &self.handle).await;
            }
        }

        let displaced = self
            .registry
            .register(user_id.clone(), self.handle.clone())
            .await
            .filter(|h| *h != self.handle);

        RelayEventLogger::log_event(
            &self.handle.id().to_string(),
            RelayEvent::Registered {
                user_id: user_id.to_string(),
                displaced_connection: displaced.map(|h| h.id().to_string()),
            },
        );

        self.state = SessionState::Identified(user_id.clone());
        RelayOutcome::Registered(user_id)
    }

    async fn relay(&self, msg: RelayMessage) -> RelayOutcome {
        let Some(recipient) = self.registry.lookup(&msg.to).await else {
            RelayEventLogger::log_event(
                &self.handle.id().to_string(),
                RelayEvent::RecipientOffline {
                    to: msg.to.to_string(),
                },
            );
            return RelayOutcome::RecipientOffline { to: msg.to };
        };

        let to = msg.to.clone();
        let payload_bytes = serde_json::to_vec(&msg.payload).map(|b| b.len()).unwrap_or(0);

        if !recipient.deliver(ServerEvent::from(msg)) {
            debug!(
                connection_id = %self.handle.id(),
                to = %to,
                "Recipient connection already closed, payload lost"
            );
        }

        RelayEventLogger::log_event(
            &self.handle.id().to_string(),
            RelayEvent::Forwarded {
                to: to.to_string(),
                payload_bytes,
            },
        );
        RelayOutcome::Forwarded { to }
    }

    /// Mark the session closed and release its presence entry. Idempotent.
    pub async fn close(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        let (user_id, presence_removed) = match previous {
            SessionState::Closed => return,
            SessionState::Connected => (None, false),
            SessionState::Identified(user_id) => {
                let removed = self.registry.remove(&user_id, &self.handle).await;
                (Some(user_id), removed)
            }
        };

        RelayEventLogger::log_event(
            &self.handle.id().to_string(),
            RelayEvent::Disconnected {
                user_id: user_id.map(|u| u.to_string()),
                presence_removed,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::presence::ClientReceiver;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    fn session(registry: &PresenceRegistry) -> (RelaySession, ClientReceiver) {
        let (handle, rx) = ConnectionHandle::channel();
        (RelaySession::new(registry.clone(), handle), rx)
    }

    #[tokio::test]
    async fn test_starts_connected_without_registry_effect() {
        let registry = PresenceRegistry::new();
        let (s, _rx) = session(&registry);
        assert_eq!(s.state(), &SessionState::Connected);
        assert!(s.user_id().is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_register_identity() {
        let registry = PresenceRegistry::new();
        let (mut s, _rx) = session(&registry);

        let outcome = s
            .dispatch(ClientEvent::RegisterIdentity { user_id: uid("alice") })
            .await;

        assert!(matches!(outcome, RelayOutcome::Registered(u) if u == uid("alice")));
        assert_eq!(s.state(), &SessionState::Identified(uid("alice")));
        assert_eq!(registry.lookup(&uid("alice")).await.as_ref(), Some(s.handle()));
    }

    #[tokio::test]
    async fn test_repeated_registration_is_idempotent() {
        let registry = PresenceRegistry::new();
        let (mut s, _rx) = session(&registry);

        for _ in 0..3 {
            s.handle_text(r#"{"type":"register-identity","userId":"alice"}"#).await;
        }

        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.lookup(&uid("alice")).await.as_ref(), Some(s.handle()));
    }

    #[tokio::test]
    async fn test_reidentify_releases_previous_id() {
        let registry = PresenceRegistry::new();
        let (mut s, _rx) = session(&registry);

        s.dispatch(ClientEvent::RegisterIdentity { user_id: uid("alice") }).await;
        s.dispatch(ClientEvent::RegisterIdentity { user_id: uid("carol") }).await;

        assert!(registry.lookup(&uid("alice")).await.is_none());
        assert_eq!(registry.lookup(&uid("carol")).await.as_ref(), Some(s.handle()));
    }

    #[tokio::test]
    async fn test_relay_between_two_connections() {
        let registry = PresenceRegistry::new();
        let (mut a, mut rx_a) = session(&registry);
        let (mut b, mut rx_b) = session(&registry);

        a.handle_text(r#"{"type":"register-identity","userId":"A"}"#).await;
        b.handle_text(r#"{"type":"register-identity","userId":"B"}"#).await;

        let outcome = a.handle_text(r#"{"type":"send","to":"B","payload":"hi"}"#).await;
        assert!(matches!(outcome, RelayOutcome::Forwarded { to } if to == uid("B")));

        assert_eq!(
            rx_b.try_recv().unwrap(),
            ServerEvent::MessageReceived { payload: json!("hi") }
        );
        assert!(rx_b.try_recv().is_err());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_self_addressed_send_is_delivered_once() {
        let registry = PresenceRegistry::new();
        let (mut a, mut rx_a) = session(&registry);
        a.dispatch(ClientEvent::RegisterIdentity { user_id: uid("A") }).await;

        let outcome = a
            .dispatch(ClientEvent::Send {
                to: uid("A"),
                payload: json!("note to self"),
            })
            .await;

        assert!(matches!(outcome, RelayOutcome::Forwarded { to } if to == uid("A")));
        assert_eq!(
            rx_a.try_recv().unwrap(),
            ServerEvent::MessageReceived { payload: json!("note to self") }
        );
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_does_not_mutate_registry() {
        let registry = PresenceRegistry::new();
        let (mut a, _rx_a) = session(&registry);
        let (mut b, _rx_b) = session(&registry);
        b.dispatch(ClientEvent::RegisterIdentity { user_id: uid("B") }).await;

        a.dispatch(ClientEvent::Send {
            to: uid("B"),
            payload: json!({"text": "hello"}),
        })
        .await;

        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.lookup(&uid("B")).await.as_ref(), Some(b.handle()));
        assert_eq!(a.state(), &SessionState::Connected);
    }

    #[tokio::test]
    async fn test_send_to_offline_user_is_dropped() {
        let registry = PresenceRegistry::new();
        let (mut a, mut rx_a) = session(&registry);
        a.dispatch(ClientEvent::RegisterIdentity { user_id: uid("A") }).await;

        let outcome = a
            .dispatch(ClientEvent::Send {
                to: uid("B"),
                payload: json!("anyone?"),
            })
            .await;

        assert!(matches!(outcome, RelayOutcome::RecipientOffline { to } if to == uid("B")));
        assert!(rx_a.try_recv().is_err());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_send_before_identification_is_allowed() {
        let registry = PresenceRegistry::new();
        let (mut anon, _rx) = session(&registry);
        let (mut b, mut rx_b) = session(&registry);
        b.dispatch(ClientEvent::RegisterIdentity { user_id: uid("B") }).await;

        let outcome = anon
            .handle_text(r#"{"type":"send-msg","to":"B","msg":{"n":1}}"#)
            .await;

        assert!(matches!(outcome, RelayOutcome::Forwarded { .. }));
        assert_eq!(
            rx_b.try_recv().unwrap(),
            ServerEvent::MessageReceived { payload: json!({"n": 1}) }
        );
    }

    #[tokio::test]
    async fn test_forward_to_closed_transport_is_silent() {
        let registry = PresenceRegistry::new();
        let (mut a, _rx_a) = session(&registry);
        let (mut b, rx_b) = session(&registry);
        b.dispatch(ClientEvent::RegisterIdentity { user_id: uid("B") }).await;
        drop(rx_b);

        let outcome = a
            .dispatch(ClientEvent::Send {
                to: uid("B"),
                payload: json!("lost"),
            })
            .await;

        assert!(matches!(outcome, RelayOutcome::Forwarded { .. }));
    }

    #[tokio::test]
    async fn test_malformed_frames_are_ignored() {
        let registry = PresenceRegistry::new();
        let (mut s, _rx) = session(&registry);

        let outcome = s.handle_text("{garbage").await;
        assert!(matches!(outcome, RelayOutcome::Ignored(RelayError::MalformedEvent(_))));

        let outcome = s.handle_text(r#"{"type":"add-user","userId":""}"#).await;
        assert!(matches!(outcome, RelayOutcome::Ignored(_)));

        assert_eq!(s.state(), &SessionState::Connected);
        assert!(registry.is_empty().await);

        // Still usable afterwards.
        s.handle_text(r#"{"type":"add-user","userId":"alice"}"#).await;
        assert_eq!(s.user_id(), Some(&uid("alice")));
    }

    #[tokio::test]
    async fn test_close_removes_presence() {
        let registry = PresenceRegistry::new();
        let (mut a, _rx) = session(&registry);
        a.dispatch(ClientEvent::RegisterIdentity { user_id: uid("A") }).await;

        a.close().await;

        assert_eq!(a.state(), &SessionState::Closed);
        assert!(registry.lookup(&uid("A")).await.is_none());
    }

    #[tokio::test]
    async fn test_close_without_identity() {
        let registry = PresenceRegistry::new();
        let (mut a, _rx) = session(&registry);
        a.close().await;
        a.close().await;
        assert_eq!(a.state(), &SessionState::Closed);
    }

    #[tokio::test]
    async fn test_displaced_session_close_keeps_successor() {
        let registry = PresenceRegistry::new();
        let (mut laptop, _rx1) = session(&registry);
        let (mut phone, _rx2) = session(&registry);

        laptop.dispatch(ClientEvent::RegisterIdentity { user_id: uid("A") }).await;
        phone.dispatch(ClientEvent::RegisterIdentity { user_id: uid("A") }).await;

        laptop.close().await;

        assert_eq!(registry.lookup(&uid("A")).await.as_ref(), Some(phone.handle()));
    }

    #[tokio::test]
    async fn test_events_after_close_are_ignored() {
        let registry = PresenceRegistry::new();
        let (mut a, _rx) = session(&registry);
        a.close().await;

        let outcome = a
            .dispatch(ClientEvent::RegisterIdentity { user_id: uid("A") })
            .await;

        assert!(matches!(outcome, RelayOutcome::Ignored(RelayError::SessionClosed)));
        assert!(registry.is_empty().await);
    }
}
