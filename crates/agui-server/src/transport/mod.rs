//! Transport sinks for validated AG-UI events.
//!
//! Both transports use the same channel-based design: agent code holds an
//! [`EventSender`] and the HTTP layer holds the matching handler. The channel
//! is bounded, so a slow client applies backpressure to the producer instead
//! of buffering without limit. Framing always goes through the core encoders.
//!
//! - **SSE**: [`sse::channel`] pairs a sender with an [`SseHandler`] that
//!   becomes a `text/event-stream` response.
//! - **WebSocket**: [`ws::channel`] pairs a sender with a [`WsHandler`] that
//!   takes over an upgraded socket, sending text or binary frames.
//!
//! # Example
//!
//! ```rust,ignore
//! use agui_server::transport::sse;
//!
//! async fn events_endpoint() -> impl IntoResponse {
//!     let (sender, handler) = sse::channel(32);
//!     tokio::spawn(async move {
//!         let _ = agui_server::drive(agent_stream(), sender).await;
//!     });
//!     handler.into_response()
//! }
//! ```
//!
//! | Feature | SSE | WebSocket |
//! |---------|-----|-----------|
//! | Direction | Server to client | Bidirectional |
//! | Auto-reconnect | Built-in (EventSource) | Manual |
//! | Binary frames | No | Yes |

use agui_core::Event;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ServerError;
use crate::sink::EventSink;

pub mod sse;
pub mod ws;

pub use sse::SseHandler;
pub use ws::{DEFAULT_PING_INTERVAL, WsConfig, WsHandler};

/// Error returned when the receiving side of a channel is gone.
///
/// Carries the event that could not be delivered.
#[derive(Debug, Clone)]
pub struct SendError<T>(pub T);

impl<T> std::fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "channel closed")
    }
}

impl<T: std::fmt::Debug> std::error::Error for SendError<T> {}

/// Sending half of a transport channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub(crate) fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, waiting for buffer space.
    ///
    /// Returns an error if the handler has been dropped (client disconnected).
    pub async fn send(&self, event: Event) -> Result<(), SendError<Event>> {
        self.sender.send(event).await.map_err(|e| SendError(e.0))
    }

    /// Sends events in order, stopping at the first failure.
    pub async fn send_many(
        &self,
        events: impl IntoIterator<Item = Event>,
    ) -> Result<(), SendError<Event>> {
        for event in events {
            self.send(event).await?;
        }
        Ok(())
    }

    /// Tries to send an event without waiting.
    ///
    /// Fails if the buffer is full or the channel is closed.
    pub fn try_send(&self, event: Event) -> Result<(), SendError<Event>> {
        self.sender
            .try_send(event)
            .map_err(|e| SendError(e.into_inner()))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[async_trait]
impl EventSink for EventSender {
    async fn emit(&self, event: Event) -> Result<(), ServerError> {
        self.send(event)
            .await
            .map_err(|e| ServerError::Channel(format!("{} dropped: {}", e.0.event_type(), e)))
    }

    fn is_connected(&self) -> bool {
        !self.is_closed()
    }
}
