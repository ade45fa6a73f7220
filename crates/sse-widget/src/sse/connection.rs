//! HTTP `text/event-stream` transport.
//!
//! [`HttpConnector`] opens one [`HttpSession`] per connection attempt. Each
//! session is a spawned task that performs the request, validates the
//! response, decodes the body and reports through its [`EventSink`]. Closing
//! or dropping the session aborts the task.

use std::{sync::Arc, time::Duration};

use futures_util::StreamExt;
use http::{HeaderMap, HeaderName, HeaderValue, header};
use parking_lot::Mutex;
use tokio::{task::JoinHandle, time::timeout};
use tracing::{debug, info, warn};

use super::decoder::EventDecoder;
use crate::{
    error::{TransportError, TransportResult},
    session::{Connector, EventSink, OpenRequest, Session},
};

const EVENT_STREAM: &str = "text/event-stream";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Last event id seen, keyed by the URL it was seen on.
#[derive(Debug, Default)]
struct LastEventId {
    inner: Mutex<Option<(String, String)>>,
}

impl LastEventId {
    /// The id to resume `url` from. Forgets a stored id from another URL.
    fn resume_from(&self, url: &str) -> Option<String> {
        let mut inner = self.inner.lock();
        match inner.as_ref() {
            Some((seen_on, id)) if seen_on == url => Some(id.clone()),
            Some(_) => {
                *inner = None;
                None
            }
            None => None,
        }
    }

    fn record(&self, url: &str, id: &str) {
        *self.inner.lock() = Some((url.to_string(), id.to_string()));
    }
}

/// Builder for [`HttpConnector`].
#[derive(Debug, Clone)]
pub struct HttpConnectorBuilder {
    connect_timeout: Duration,
    headers: HeaderMap,
    credential_headers: HeaderMap,
}

impl Default for HttpConnectorBuilder {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            headers: HeaderMap::new(),
            credential_headers: HeaderMap::new(),
        }
    }
}

impl HttpConnectorBuilder {
    /// Time allowed for the response headers to arrive (default 10s).
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Header sent with every request.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Header sent only when the widget is configured to send credentials,
    /// e.g. `Cookie` or `Authorization`.
    #[must_use]
    pub fn credential_header(mut self, name: HeaderName, mut value: HeaderValue) -> Self {
        value.set_sensitive(true);
        self.credential_headers.insert(name, value);
        self
    }

    /// Build the connector.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] if the HTTP client cannot be created.
    pub fn build(self) -> TransportResult<HttpConnector> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .build()?;
        Ok(HttpConnector {
            client,
            connect_timeout: self.connect_timeout,
            headers: Arc::new(self.headers),
            credential_headers: Arc::new(self.credential_headers),
            last_event_id: Arc::new(LastEventId::default()),
        })
    }
}

/// [`Connector`] that streams events over HTTP.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
    connect_timeout: Duration,
    headers: Arc<HeaderMap>,
    credential_headers: Arc<HeaderMap>,
    last_event_id: Arc<LastEventId>,
}

impl HttpConnector {
    /// Connector with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] if the HTTP client cannot be created.
    pub fn new() -> TransportResult<Self> {
        Self::builder().build()
    }

    pub fn builder() -> HttpConnectorBuilder {
        HttpConnectorBuilder::default()
    }

    fn request_headers(&self, url: &str, with_credentials: bool) -> HeaderMap {
        let mut headers = (*self.headers).clone();
        headers.insert(header::ACCEPT, HeaderValue::from_static(EVENT_STREAM));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        if with_credentials {
            for (name, value) in self.credential_headers.iter() {
                headers.insert(name.clone(), value.clone());
            }
        }

        // Last-Event-ID for resumption.
        if let Some(id) = self.last_event_id.resume_from(url)
            && let Ok(value) = HeaderValue::from_str(&id)
        {
            headers.insert(HeaderName::from_static("last-event-id"), value);
        }
        headers
    }
}

impl Connector for HttpConnector {
    type Session = HttpSession;

    fn open(&mut self, request: OpenRequest<'_>, sink: EventSink) -> TransportResult<HttpSession> {
        check_url(request.url)?;

        let headers = self.request_headers(request.url, request.with_credentials);
        let attempt = Attempt {
            request: self.client.get(request.url).headers(headers),
            url: request.url.to_string(),
            connect_timeout: self.connect_timeout,
            last_event_id: Arc::clone(&self.last_event_id),
        };
        let task = tokio::spawn(run_session(attempt, sink));
        Ok(HttpSession { task: Some(task) })
    }
}

/// A running HTTP stream. Aborted on [`close`](Session::close) or drop.
#[derive(Debug)]
pub struct HttpSession {
    task: Option<JoinHandle<()>>,
}

impl Session for HttpSession {
    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for HttpSession {
    fn drop(&mut self) {
        self.close();
    }
}

struct Attempt {
    request: reqwest::RequestBuilder,
    url: String,
    connect_timeout: Duration,
    last_event_id: Arc<LastEventId>,
}

async fn run_session(attempt: Attempt, sink: EventSink) {
    let session = sink.id();
    if let Err(err) = stream_events(attempt, &sink).await {
        debug!(session = %session, error = %err, "SSE session ended");
        sink.errored(err);
    }
}

/// Drive one connection until it fails. Returns `Ok` only when the owner
/// went away.
async fn stream_events(attempt: Attempt, sink: &EventSink) -> TransportResult<()> {
    let Attempt {
        request,
        url,
        connect_timeout,
        last_event_id,
    } = attempt;

    let resp = timeout(connect_timeout, request.send())
        .await
        .map_err(|_| TransportError::timeout(connect_timeout))??;

    let status = resp.status();
    if !status.is_success() {
        return Err(TransportError::invalid_status(status));
    }
    if let Some(ct) = resp.headers().get(header::CONTENT_TYPE) {
        let ct = ct.to_str().unwrap_or("");
        if !ct.contains(EVENT_STREAM) {
            return Err(TransportError::invalid_content_type(ct));
        }
    }

    info!(url = %url, session = %sink.id(), "SSE response received");
    if !sink.opened() {
        return Ok(());
    }

    let mut body = resp.bytes_stream();
    let mut decoder = EventDecoder::new();
    while let Some(chunk) = body.next().await {
        if !forward_chunk(&mut decoder, &chunk?, &url, &last_event_id, sink)? {
            return Ok(());
        }
    }

    warn!(url = %url, "SSE stream ended");
    Err(TransportError::StreamEnded)
}

/// Decode one chunk and forward its events, including those that precede an
/// undecodable line. Returns `Ok(false)` once the owner went away.
fn forward_chunk(
    decoder: &mut EventDecoder,
    chunk: &[u8],
    url: &str,
    last_event_id: &LastEventId,
    sink: &EventSink,
) -> TransportResult<bool> {
    let mut events = Vec::new();
    let decoded = decoder.decode(chunk, &mut events);
    for event in events {
        if !event.id.is_empty() {
            last_event_id.record(url, &event.id);
        }
        debug!(event_type = %event.event_type, id = %event.id, "SSE event received");
        if !sink.message(event) {
            return Ok(false);
        }
    }
    decoded.map_err(|e| TransportError::decode(e.to_string()))?;
    Ok(true)
}

fn check_url(raw: &str) -> TransportResult<()> {
    if raw.is_empty() {
        return Err(TransportError::invalid_url(raw, "empty"));
    }
    let url = url::Url::parse(raw).map_err(|e| TransportError::invalid_url(raw, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(TransportError::invalid_url(
            raw,
            format!("unsupported scheme {other:?}"),
        )),
    }
}
