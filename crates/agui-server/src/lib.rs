//! Async plumbing for the AG-UI event protocol.
//!
//! `agui-core` decides whether a stream of events is well formed. This crate
//! moves those events between an agent and a client:
//!
//! - **Drivers** ([`driver`]): pull events from a stream with [`drive`], or
//!   push them through a [`ValidatingSink`]. Both apply the termination
//!   contract when the producer stops early.
//! - **Transports** ([`transport`]): bounded SSE and WebSocket channel pairs
//!   that plug into axum.
//! - **Producer helpers** ([`producer`]): session, message, tool call,
//!   thinking and state helpers that emit correctly paired events.
//!
//! # Usage
//!
//! ```rust,ignore
//! use agui_server::{drive, transport::sse};
//!
//! async fn events_endpoint() -> axum::response::Response {
//!     let (sender, handler) = sse::channel(32);
//!     tokio::spawn(async move {
//!         if let Err(e) = drive(agent_events(), sender).await {
//!             tracing::debug!(error = %e, "client went away");
//!         }
//!     });
//!     handler.into_response()
//! }
//! ```

pub mod driver;
pub mod error;
pub mod producer;
pub mod sink;
pub mod transport;

// Re-export agui-core types for convenience
pub use agui_core::*;

pub use error::{Result, ServerError};

pub use driver::{ValidatingSink, drive, drive_with_policy, fan_in};
pub use sink::EventSink;
pub use transport::{EventSender, SendError, SseHandler, WsConfig, WsHandler};

pub use producer::{
    AgentSession, MessageStream, StateStream, ThinkingMessageStream, ThinkingStep,
    ToolCallStream,
};
