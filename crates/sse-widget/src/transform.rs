//! Payload transform hooks.
//!
//! Every message of the live session is passed through a [`PayloadTransform`]
//! before it is displayed and emitted. A failing hook only affects what is
//! shown; it never touches the connection.

use std::{fmt, marker::PhantomData, time::SystemTime};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::{error::TransformError, sse::SseEvent};

/// Renders a transformed payload as display text.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for String {
    fn render(&self) -> String {
        self.clone()
    }
}

impl Render for serde_json::Value {
    fn render(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Turns a raw event into the widget's payload type.
#[async_trait]
pub trait PayloadTransform: Send + Sync + 'static {
    type Output: Render + Clone + fmt::Debug + Send + Sync + 'static;

    /// Transform one message.
    ///
    /// # Errors
    ///
    /// Returns a [`TransformError`] if the message cannot be turned into a
    /// payload.
    async fn transform(&self, event: SseEvent) -> Result<Self::Output, TransformError>;
}

/// Default payload: the event fields plus the time it was received.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Payload {
    pub data: String,
    pub id: String,
    pub event_type: String,
    pub received_at: SystemTime,
}

impl Render for Payload {
    fn render(&self) -> String {
        self.data.clone()
    }
}

/// Wraps each event in a [`Payload`] unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassThrough;

#[async_trait]
impl PayloadTransform for PassThrough {
    type Output = Payload;

    async fn transform(&self, event: SseEvent) -> Result<Payload, TransformError> {
        Ok(Payload {
            data: event.data,
            id: event.id,
            event_type: event.event_type,
            received_at: SystemTime::now(),
        })
    }
}

/// Parses the event data as JSON.
pub struct JsonTransform<T = serde_json::Value> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonTransform<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonTransform<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonTransform<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonTransform")
            .field("output", &std::any::type_name::<T>())
            .finish()
    }
}

#[async_trait]
impl<T> PayloadTransform for JsonTransform<T>
where
    T: DeserializeOwned + Render + Clone + fmt::Debug + Send + Sync + 'static,
{
    type Output = T;

    async fn transform(&self, event: SseEvent) -> Result<T, TransformError> {
        serde_json::from_str(event.data())
            .map_err(|e| TransformError::failed(format!("invalid JSON payload: {e}")))
    }
}

/// Adapts a synchronous closure.
pub struct FnTransform<F> {
    f: F,
}

impl<F> FnTransform<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FnTransform<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransform").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, O> PayloadTransform for FnTransform<F>
where
    F: Fn(SseEvent) -> Result<O, TransformError> + Send + Sync + 'static,
    O: Render + Clone + fmt::Debug + Send + Sync + 'static,
{
    type Output = O;

    async fn transform(&self, event: SseEvent) -> Result<O, TransformError> {
        (self.f)(event)
    }
}
