//! Connection session abstraction.
//!
//! A [`Connector`] opens one [`Session`] per connection attempt. The session
//! reports back through an [`EventSink`] that tags every event with the
//! session's [`SessionId`], so the controller can discard anything a
//! superseded session still had in flight.

use std::fmt;

use tokio::sync::mpsc;

use crate::{
    controller::ControlEvent,
    error::{TransportError, TransportResult},
    sse::SseEvent,
};

/// Identifier of one connection attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Transport event reported by a session.
#[derive(Debug)]
pub enum SessionEvent {
    /// The stream is established.
    Opened,
    /// A message arrived.
    Message(SseEvent),
    /// The session is no longer usable and must be torn down.
    Errored(TransportError),
}

/// Parameters of a single connection attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenRequest<'a> {
    pub url: &'a str,
    pub with_credentials: bool,
}

/// Channel a session uses to report [`SessionEvent`]s to its owner.
#[derive(Clone, Debug)]
pub struct EventSink {
    id: SessionId,
    tx: mpsc::UnboundedSender<ControlEvent>,
}

impl EventSink {
    pub(crate) fn new(id: SessionId, tx: mpsc::UnboundedSender<ControlEvent>) -> Self {
        Self { id, tx }
    }

    /// The session this sink belongs to.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Report that the stream is established.
    ///
    /// Returns `false` if the owner is gone and the session should stop.
    pub fn opened(&self) -> bool {
        self.send(SessionEvent::Opened)
    }

    /// Report an incoming message.
    pub fn message(&self, event: SseEvent) -> bool {
        self.send(SessionEvent::Message(event))
    }

    /// Report that the session failed.
    pub fn errored(&self, error: TransportError) -> bool {
        self.send(SessionEvent::Errored(error))
    }

    fn send(&self, event: SessionEvent) -> bool {
        self.tx
            .send(ControlEvent::Session { id: self.id, event })
            .is_ok()
    }
}

/// Opens connection sessions.
pub trait Connector: Send + 'static {
    type Session: Session;

    /// Begin an asynchronous connection attempt.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] if the URL is empty or
    /// malformed. Failures after this call returns are reported through
    /// `sink`.
    fn open(&mut self, request: OpenRequest<'_>, sink: EventSink) -> TransportResult<Self::Session>;
}

/// A live connection attempt.
pub trait Session: Send + 'static {
    /// Release the connection. No event sent after this returns will be
    /// acted upon.
    fn close(&mut self);
}
