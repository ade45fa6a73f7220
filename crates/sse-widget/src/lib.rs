//! # SSE Widget
//!
//! Self-healing Server-Sent Events client for live-updating displays.
//!
//! A widget keeps one `text/event-stream` connection alive, passes every
//! message through a payload transform, and publishes a connection status, a
//! rendered display and a stream of notifications.
//!
//! ## Features
//!
//! - **Reconnection State Machine**: Exponential backoff with symmetric jitter,
//!   bounded or unbounded retries, manual reconnect and network signals.
//! - **Live Reconfiguration**: URL or credential changes reconnect at once;
//!   invalid changes are rejected and the previous configuration stays.
//! - **Stale Event Isolation**: Every session and retry timer is tagged, so a
//!   superseded connection can never affect the current one.
//! - **Payload Transforms**: Async hook with ordered delivery; failures only
//!   change the display.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sse_widget::{JsonTransform, StreamWidget, WidgetConfig, WidgetEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WidgetConfig::new("https://api.example.com/prices")
//!         .max_attempts(Some(10));
//!     let (handle, mut events) =
//!         StreamWidget::attach(config, JsonTransform::<serde_json::Value>::new())?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let WidgetEvent::Data(value) = event {
//!             println!("{value} ({})", handle.status());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod reconnect;
pub mod session;
pub mod sse;
pub mod timer;
pub mod transform;
pub mod widget;

pub use config::{ConfigChange, ConfigUpdate, WidgetConfig};
pub use controller::{ConnectionStatus, ControllerState, ReconnectController};
pub use error::{ConfigError, Error, TransformError, TransportError, TransportResult};
pub use reconnect::BackoffPolicy;
pub use session::{Connector, EventSink, OpenRequest, Session, SessionEvent, SessionId};
pub use sse::{HttpConnector, SseEvent};
pub use transform::{FnTransform, JsonTransform, PassThrough, Payload, PayloadTransform, Render};
pub use widget::{Display, StreamWidget, Tone, WidgetEvent, WidgetEvents, WidgetHandle};
