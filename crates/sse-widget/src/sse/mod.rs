//! Server-Sent Events transport.
//!
//! - [`EventDecoder`] turns `text/event-stream` bytes into [`SseEvent`]s.
//! - [`HttpConnector`] opens one [`HttpSession`] per connection attempt and
//!   reports `Opened`, messages and the terminating error through the
//!   session's [`EventSink`](crate::session::EventSink).
//!
//! ```text
//! ReconnectController ── open ──► HttpConnector
//!        ▲                             │ tokio::spawn
//!        │                             ▼
//!        └──── ControlEvent ◄──── HttpSession (GET, decode, forward)
//! ```
//!
//! Retry decisions are not made here; a session ends at its first error.

pub mod connection;
pub mod decoder;
mod types;

pub use connection::{HttpConnector, HttpConnectorBuilder, HttpSession};
pub use decoder::{DecodeError, EventDecoder};
pub use types::{DEFAULT_EVENT_TYPE, SseEvent};
