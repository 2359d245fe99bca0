//! Transport framing for validated events.
//!
//! - [`SseEncoder`]: one `data: <json>\n\n` record per event, for
//!   `text/event-stream` responses.
//! - [`MessageEncoder`]: one JSON document per event, as text or as UTF-8
//!   bytes, for message-oriented transports such as WebSocket.
//!
//! Encoders are stateless: the same event always produces byte-identical
//! output, and `None` fields are omitted. [`SseDecoder`] is the inverse of
//! [`SseEncoder`] for captured streams.

use tracing::trace;

use crate::error::{MalformedEventError, Result};
use crate::event::Event;

/// Content type of the text-stream framing.
pub const SSE_CONTENT_TYPE: &str = "text/event-stream";

/// Content type of the message framing.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Converts one event into a transport frame.
pub trait EventEncoder: Send + Sync {
    type Frame;

    /// MIME type announced to the client.
    fn content_type(&self) -> &'static str;

    fn encode(&self, event: &Event) -> Result<Self::Frame>;

    /// Whether frames survive a generic compression layer intact.
    fn can_compress(&self) -> bool;
}

/// Server-Sent Events framing.
///
/// ```rust
/// use agui_core::encoder::{EventEncoder, SseEncoder};
/// use agui_core::{Event, RunErrorEvent};
///
/// let frame = SseEncoder.encode(&Event::from(RunErrorEvent::new("boom"))).unwrap();
/// assert_eq!(frame, "data: {\"type\":\"RUN_ERROR\",\"message\":\"boom\"}\n\n");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SseEncoder;

impl EventEncoder for SseEncoder {
    type Frame = String;

    fn content_type(&self) -> &'static str {
        SSE_CONTENT_TYPE
    }

    fn encode(&self, event: &Event) -> Result<String> {
        let json = serde_json::to_string(event)?;
        trace!(event_type = %event.event_type(), bytes = json.len(), "encoded sse frame");
        Ok(format!("data: {json}\n\n"))
    }

    fn can_compress(&self) -> bool {
        false
    }
}

/// Message-oriented JSON framing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageEncoder;

impl MessageEncoder {
    /// Encodes the event as UTF-8 bytes, for binary frames.
    pub fn encode_binary(&self, event: &Event) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(event)?)
    }
}

impl EventEncoder for MessageEncoder {
    type Frame = String;

    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    fn encode(&self, event: &Event) -> Result<String> {
        Ok(serde_json::to_string(event)?)
    }

    fn can_compress(&self) -> bool {
        true
    }
}

/// Which framing a client asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderKind {
    Sse,
    Message,
}

impl EncoderKind {
    /// Picks a framing from an `Accept` header.
    ///
    /// `application/json` selects message framing; anything else, including
    /// a missing header or `*/*`, selects SSE.
    pub fn negotiate(accept: Option<&str>) -> Self {
        let Some(accept) = accept else {
            return EncoderKind::Sse;
        };
        for media_range in accept.split(',') {
            let media_type = media_range
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            match media_type.as_str() {
                SSE_CONTENT_TYPE => return EncoderKind::Sse,
                JSON_CONTENT_TYPE => return EncoderKind::Message,
                _ => {}
            }
        }
        EncoderKind::Sse
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            EncoderKind::Sse => SSE_CONTENT_TYPE,
            EncoderKind::Message => JSON_CONTENT_TYPE,
        }
    }

    /// Encodes with the selected framing.
    pub fn encode(&self, event: &Event) -> Result<String> {
        match self {
            EncoderKind::Sse => SseEncoder.encode(event),
            EncoderKind::Message => MessageEncoder.encode(event),
        }
    }
}

/// Incremental parser for `text/event-stream` bodies.
///
/// Feed it text in arbitrary pieces; it yields one decoded event per complete
/// record. Comment lines (`:`) and fields other than `data` are ignored, and
/// multi-line `data` fields are joined with `\n`.
///
/// ```rust
/// use agui_core::encoder::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// assert!(decoder.feed("data: {\"type\":\"RUN_ERROR\",").is_empty());
/// let events = decoder.feed("\"message\":\"x\"}\n\n");
/// assert_eq!(events.len(), 1);
/// assert!(events[0].is_ok());
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends text and returns every record it completed.
    pub fn feed(&mut self, chunk: &str) -> Vec<std::result::Result<Event, MalformedEventError>> {
        self.feed_data(chunk)
            .iter()
            .map(|payload| Event::from_json(payload))
            .collect()
    }

    /// Like [`feed`](Self::feed), but returns the undecoded `data` payloads.
    pub fn feed_data(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let mut payloads = Vec::new();

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                payloads.extend(self.dispatch());
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            if field == "data" {
                self.data.push(value.to_string());
            }
        }
        payloads
    }

    /// Flushes a trailing record that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<std::result::Result<Event, MalformedEventError>> {
        self.finish_data().map(|payload| Event::from_json(&payload))
    }

    pub fn finish_data(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim_end_matches(['\n', '\r']);
        if let Some(value) = rest.strip_prefix("data:") {
            self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{RunStartedEvent, TextMessageContentEvent, ToolCallStartEvent};

    #[test]
    fn test_sse_frame_shape() {
        let event: Event = TextMessageContentEvent::new("m1", "Hi").into();
        let frame = SseEncoder.encode(&event).unwrap();
        assert_eq!(
            frame,
            "data: {\"type\":\"TEXT_MESSAGE_CONTENT\",\"messageId\":\"m1\",\"delta\":\"Hi\"}\n\n"
        );
        assert_eq!(SseEncoder.content_type(), "text/event-stream");
        assert!(!SseEncoder.can_compress());
    }

    #[test]
    fn test_message_frames() {
        let event: Event = RunStartedEvent::new("t1", "r1").into();
        let text = MessageEncoder.encode(&event).unwrap();
        assert_eq!(text, r#"{"type":"RUN_STARTED","threadId":"t1","runId":"r1"}"#);
        assert_eq!(MessageEncoder.encode_binary(&event).unwrap(), text.as_bytes());
        assert_eq!(MessageEncoder.content_type(), "application/json");
        assert!(MessageEncoder.can_compress());
    }

    #[test]
    fn test_negotiate() {
        assert_eq!(EncoderKind::negotiate(None), EncoderKind::Sse);
        assert_eq!(EncoderKind::negotiate(Some("*/*")), EncoderKind::Sse);
        assert_eq!(
            EncoderKind::negotiate(Some("application/json; q=0.9, text/html")),
            EncoderKind::Message
        );
        assert_eq!(
            EncoderKind::negotiate(Some("text/event-stream")),
            EncoderKind::Sse
        );
        assert_eq!(EncoderKind::Message.content_type(), "application/json");
    }

    #[test]
    fn test_decoder_handles_split_records_and_comments() {
        let first: Event = RunStartedEvent::new("t1", "r1").into();
        let second: Event = ToolCallStartEvent::new("c1", "search").into();
        let stream = format!(
            ": keep-alive\n\n{}{}",
            SseEncoder.encode(&first).unwrap(),
            SseEncoder.encode(&second).unwrap()
        );
        let (head, tail) = stream.split_at(25);

        let mut decoder = SseDecoder::new();
        let mut events: Vec<Event> = decoder.feed(head).into_iter().map(|r| r.unwrap()).collect();
        events.extend(decoder.feed(tail).into_iter().map(|r| r.unwrap()));
        assert_eq!(events, vec![first, second]);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_decoder_joins_multiline_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed("event: x\r\ndata: {\"type\":\"RUN_ERROR\",\r\ndata: \"message\":\"m\"}\r\n\r\n");
        assert_eq!(events.len(), 1);
        match events[0].as_ref().unwrap() {
            Event::RunError(e) => assert_eq!(e.message, "m"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decoder_flushes_trailing_record() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed("data: {\"type\":\"RUN_ERROR\",\"message\":\"m\"}").is_empty());
        assert!(decoder.finish().unwrap().is_ok());
    }

    #[test]
    fn test_decoder_exposes_raw_payloads() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed_data(": ping\n\ndata: not json\n\ndata: {}\n");
        assert_eq!(payloads, vec!["not json".to_string()]);
        assert_eq!(decoder.finish_data().as_deref(), Some("{}"));
    }

    #[test]
    fn test_decoder_reports_malformed_record() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed("data: {\"type\":\"NOPE\"}\n\n");
        assert_eq!(events[0].as_ref().unwrap_err().field, "type");
    }
}
