//! Incremental `text/event-stream` decoder.
//!
//! Feed arbitrary byte chunks with [`EventDecoder::decode`]; complete events
//! are returned as soon as their terminating blank line arrives. Follows the
//! event stream interpretation rules of the
//! [HTML Living Standard](https://html.spec.whatwg.org/multipage/server-sent-events.html).

use std::{str::Utf8Error, time::Duration};

use bytes::{Buf, BytesMut};
use thiserror::Error;

use super::types::{DEFAULT_EVENT_TYPE, SseEvent};

const LF: u8 = b'\n';
const CR: u8 = b'\r';
const BOM: &[u8] = "\u{FEFF}".as_bytes();

/// The stream contained a line that is not valid UTF-8.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid UTF-8 in event stream: {0}")]
pub struct DecodeError(#[source] Utf8Error);

impl From<Utf8Error> for DecodeError {
    fn from(e: Utf8Error) -> Self {
        Self(e)
    }
}

/// Stateful decoder turning byte chunks into [`SseEvent`]s.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buffer: BytesMut,
    bom_checked: bool,
    event_type: String,
    data: String,
    has_data: bool,
    retry: Option<Duration>,
    last_event_id: String,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id carried by the most recent `id:` field.
    pub fn last_event_id(&self) -> &str {
        &self.last_event_id
    }

    /// Decode a chunk, appending every event it completes to `events`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if a complete line is not valid UTF-8. Events
    /// completed before that line are still appended.
    pub fn decode(&mut self, chunk: &[u8], events: &mut Vec<SseEvent>) -> Result<(), DecodeError> {
        self.buffer.extend_from_slice(chunk);
        if !self.skip_bom() {
            return Ok(());
        }

        while let Some((line_end, next_line)) = find_eol(&self.buffer) {
            let line = self.buffer.split_to(line_end);
            self.buffer.advance(next_line - line_end);

            let line = std::str::from_utf8(&line)?;
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        Ok(())
    }

    /// Drops a leading BOM once. Returns `false` while the buffer is still a
    /// strict prefix of the BOM.
    fn skip_bom(&mut self) -> bool {
        if self.bom_checked {
            return true;
        }
        if self.buffer.len() < BOM.len() && BOM.starts_with(&self.buffer) {
            return false;
        }
        if self.buffer.starts_with(BOM) {
            self.buffer.advance(BOM.len());
        }
        self.bom_checked = true;
        true
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event_type = value.to_string(),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = value.to_string();
                }
            }
            "retry" => {
                if !value.is_empty()
                    && value.bytes().all(|b| b.is_ascii_digit())
                    && let Ok(millis) = value.parse()
                {
                    self.retry = Some(Duration::from_millis(millis));
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event_type = std::mem::take(&mut self.event_type);
        let retry = self.retry.take();
        let data = std::mem::take(&mut self.data);
        if !std::mem::take(&mut self.has_data) {
            return None;
        }

        Some(SseEvent {
            event_type: if event_type.is_empty() {
                DEFAULT_EVENT_TYPE.to_string()
            } else {
                event_type
            },
            data,
            id: self.last_event_id.clone(),
            retry,
        })
    }
}

/// Returns `(line_end, next_line_start)` for the first line terminator, or
/// `None` if more data is needed. A trailing CR may be the first half of a
/// CRLF pair, so it waits for the next chunk.
fn find_eol(bytes: &[u8]) -> Option<(usize, usize)> {
    let pos = memchr::memchr2(CR, LF, bytes)?;
    if bytes[pos] == LF {
        return Some((pos, pos + 1));
    }
    match bytes.get(pos + 1) {
        None => None,
        Some(&LF) => Some((pos, pos + 2)),
        Some(_) => Some((pos, pos + 1)),
    }
}
