//! Structured logging for chatrelay.
//!
//! Console and rolling NDJSON output, plus the relay event logger.

pub mod event_logger;
pub mod logger;

pub use event_logger::{EventLogEntry, RelayEvent, RelayEventLogger};
pub use logger::{init_logger, LogFormat, LogSettings};
