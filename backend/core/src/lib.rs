pub mod error;
pub mod types;

pub use error::RelayError;
pub use types::{ConnectionId, RelayMessage, UserId};
