//! chatrelay gateway
//!
//! Real-time presence directory and point-to-point message relay over
//! WebSockets, plus the small HTTP surface around it.

pub mod health_api;
pub mod presence;
pub mod protocol;
pub mod server;
pub mod session;
pub mod ws_server;

pub use presence::{ConnectionHandle, PresenceRegistry};
pub use protocol::{ClientEvent, ServerEvent};
pub use server::{build_router, cors_layer, start_server, GatewayConfig, GatewayState};
pub use session::{RelayOutcome, RelaySession, SessionState};
