//! Server-Sent Events transport.
//!
//! [`channel`] returns an [`EventSender`] for agent code and an [`SseHandler`]
//! that converts into a streaming `text/event-stream` response. Each event
//! becomes exactly one `data: <json>\n\n` record produced by [`SseEncoder`],
//! and the body ends when every sender has been dropped.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use agui_core::encoder::{EventEncoder, SSE_CONTENT_TYPE, SseEncoder};
use agui_core::Event;
use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use super::EventSender;

/// Receiving half of an SSE channel.
pub struct SseHandler {
    receiver: mpsc::Receiver<Event>,
}

impl SseHandler {
    /// Converts this handler into a streaming HTTP response.
    pub fn into_response(self) -> Response {
        let frames = SseFrameStream {
            inner: ReceiverStream::new(self.receiver),
        };
        (
            [
                (header::CONTENT_TYPE, SSE_CONTENT_TYPE),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            Body::from_stream(frames),
        )
            .into_response()
    }
}

impl IntoResponse for SseHandler {
    fn into_response(self) -> Response {
        SseHandler::into_response(self)
    }
}

/// Turns received events into encoded SSE records.
struct SseFrameStream {
    inner: ReceiverStream<Event>,
}

impl Stream for SseFrameStream {
    type Item = Result<String, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(event)) => match SseEncoder.encode(&event) {
                    Ok(frame) => return Poll::Ready(Some(Ok(frame))),
                    Err(e) => {
                        warn!(event_type = %event.event_type(), error = %e, "dropping unencodable sse frame");
                    }
                },
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Creates a connected SSE channel pair.
///
/// `buffer` is how many events may be queued before `send` waits
/// (and `try_send` fails).
pub fn channel(buffer: usize) -> (EventSender, SseHandler) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), SseHandler { receiver: rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agui_core::{RunErrorEvent, RunStartedEvent, TextMessageStartEvent};

    #[tokio::test]
    async fn test_channel_creation() {
        let (sender, _handler) = channel(10);
        assert!(!sender.is_closed());
    }

    #[tokio::test]
    async fn test_send_event() {
        let (sender, mut handler) = channel(10);
        let event: Event = TextMessageStartEvent::new("m1").into();

        sender.send(event.clone()).await.unwrap();

        let received = handler.receiver.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn test_channel_close_detection() {
        let (sender, handler) = channel(10);
        drop(handler);

        assert!(sender.is_closed());
        let result = sender.send(RunErrorEvent::new("test").into()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_try_send_respects_buffer() {
        let (sender, _handler) = channel(2);
        let event: Event = RunErrorEvent::new("test").into();

        assert!(sender.try_send(event.clone()).is_ok());
        assert!(sender.try_send(event.clone()).is_ok());
        assert!(sender.try_send(event).is_err());
    }

    #[tokio::test]
    async fn test_response_body_is_encoded_frames() {
        let (sender, handler) = channel(4);
        let events: Vec<Event> = vec![
            RunStartedEvent::new("t1", "r1").into(),
            RunErrorEvent::new("boom").into(),
        ];
        sender.send_many(events.clone()).await.unwrap();
        drop(sender);

        let response = handler.into_response();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let expected: String = events
            .iter()
            .map(|e| SseEncoder.encode(e).unwrap())
            .collect();
        assert_eq!(body, expected.as_bytes());
    }
}
