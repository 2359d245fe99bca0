//! WebSocket transport.
//!
//! [`channel`] returns an [`EventSender`] for agent code and a [`WsHandler`]
//! that takes over an upgraded socket. Each event is sent as one WebSocket
//! message framed by [`MessageEncoder`]: a text frame by default, or a binary
//! frame carrying the same UTF-8 JSON when [`WsConfig::binary_frames`] is set.
//!
//! The handler also sends periodic pings and stops as soon as the client
//! closes the socket. Inbound text and binary messages are ignored; the
//! event stream is server to client only.

use std::time::Duration;

use agui_core::encoder::{EventEncoder, MessageEncoder};
use agui_core::{Event, ProtocolError};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, warn};

use super::EventSender;

/// Default ping interval for WebSocket keep-alive (30 seconds).
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for WebSocket connections.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Interval between ping messages for keep-alive.
    pub ping_interval: Duration,
    pub enable_ping: bool,
    /// Send events as binary frames instead of text frames.
    pub binary_frames: bool,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            enable_ping: true,
            binary_frames: false,
        }
    }
}

impl WsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn disable_ping(mut self) -> Self {
        self.enable_ping = false;
        self
    }

    pub fn binary_frames(mut self, binary: bool) -> Self {
        self.binary_frames = binary;
        self
    }
}

/// Receiving half of a WebSocket channel.
pub struct WsHandler {
    receiver: mpsc::Receiver<Event>,
    config: WsConfig,
}

impl WsHandler {
    /// Completes the upgrade and streams events over the socket.
    pub fn into_response(self, upgrade: WebSocketUpgrade) -> Response {
        upgrade.on_upgrade(move |socket| self.handle_socket(socket))
    }

    async fn handle_socket(self, socket: WebSocket) {
        let (mut ws_sender, mut ws_receiver) = socket.split();
        let mut event_receiver = self.receiver;
        let binary = self.config.binary_frames;

        let mut ping_interval = self
            .config
            .enable_ping
            .then(|| interval(self.config.ping_interval));

        loop {
            tokio::select! {
                event = event_receiver.recv() => {
                    let Some(event) = event else {
                        // Every sender is gone: the run is over.
                        let _ = ws_sender.send(Message::Close(None)).await;
                        break;
                    };
                    let frame = match encode_frame(&event, binary) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(event_type = %event.event_type(), error = %e, "dropping unencodable ws frame");
                            continue;
                        }
                    };
                    if ws_sender.send(frame).await.is_err() {
                        debug!("websocket client went away mid-stream");
                        break;
                    }
                }

                _ = async {
                    match ping_interval.as_mut() {
                        Some(ticker) => {
                            ticker.tick().await;
                        }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    if ws_sender.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                }

                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            debug!(error = %e, "websocket receive failed");
                            break;
                        }
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }
}

/// Frames one event as a WebSocket message.
pub fn encode_frame(event: &Event, binary: bool) -> Result<Message, ProtocolError> {
    if binary {
        Ok(Message::Binary(MessageEncoder.encode_binary(event)?.into()))
    } else {
        Ok(Message::Text(MessageEncoder.encode(event)?.into()))
    }
}

/// Creates a connected WebSocket channel pair with default configuration.
pub fn channel(buffer: usize) -> (EventSender, WsHandler) {
    channel_with_config(buffer, WsConfig::default())
}

/// Creates a connected WebSocket channel pair.
///
/// ```rust,ignore
/// let config = WsConfig::new()
///     .ping_interval(Duration::from_secs(15))
///     .binary_frames(true);
/// let (sender, handler) = ws::channel_with_config(32, config);
/// ```
pub fn channel_with_config(buffer: usize, config: WsConfig) -> (EventSender, WsHandler) {
    let (tx, rx) = mpsc::channel(buffer);
    (
        EventSender::new(tx),
        WsHandler {
            receiver: rx,
            config,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use agui_core::{RunErrorEvent, TextMessageStartEvent};

    #[tokio::test]
    async fn test_channel_with_config() {
        let config = WsConfig::new()
            .ping_interval(Duration::from_secs(10))
            .disable_ping()
            .binary_frames(true);

        let (sender, handler) = channel_with_config(10, config);
        assert!(!sender.is_closed());
        assert!(!handler.config.enable_ping);
        assert!(handler.config.binary_frames);
        assert_eq!(handler.config.ping_interval, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_send_event() {
        let (sender, mut handler) = channel(10);
        let event: Event = TextMessageStartEvent::new("m1").into();

        sender.send(event.clone()).await.unwrap();

        assert_eq!(handler.receiver.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_dropped_handler_closes_sender() {
        let (sender, handler) = channel(10);
        drop(handler);
        assert!(sender.is_closed());
        assert!(sender.send(RunErrorEvent::new("x").into()).await.is_err());
    }

    #[test]
    fn test_text_frame() {
        let event: Event = RunErrorEvent::new("test error").into();
        match encode_frame(&event, false).unwrap() {
            Message::Text(text) => {
                assert_eq!(text.as_str(), r#"{"type":"RUN_ERROR","message":"test error"}"#)
            }
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[test]
    fn test_binary_frame_carries_same_json() {
        let event: Event = TextMessageStartEvent::new("m1").into();
        match encode_frame(&event, true).unwrap() {
            Message::Binary(bytes) => {
                assert_eq!(bytes.as_ref(), MessageEncoder.encode(&event).unwrap().as_bytes())
            }
            other => panic!("expected binary frame, got {other:?}"),
        }
    }

    #[test]
    fn test_ws_config_default() {
        let config = WsConfig::default();
        assert!(config.enable_ping);
        assert!(!config.binary_frames);
        assert_eq!(config.ping_interval, DEFAULT_PING_INTERVAL);
    }

    #[test]
    fn test_send_error_display() {
        let error = super::super::SendError(42);
        assert_eq!(error.to_string(), "channel closed");
    }
}
