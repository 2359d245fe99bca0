//! AG-UI protocol engine.
//!
//! This crate decides whether a stream of AG-UI events is well formed and
//! keeps the per-run state those events describe:
//!
//! - **Event model** ([`event`]): the closed set of 23 event shapes, decoding
//!   and field validation.
//! - **Run state machine** ([`machine`]): run, message, tool-call, thinking
//!   and step lifecycles, including chunk auto-open/auto-close.
//! - **State synchronization** ([`state`], [`patch`]): snapshots and
//!   RFC 6902 deltas, applied atomically.
//! - **Sequencer** ([`sequencer`]): the composition of the three above, with
//!   the termination contract.
//! - **Encoders** ([`encoder`]): SSE and message framing.
//!
//! Everything here is synchronous. Async drivers and transports live in
//! `agui-server`.
//!
//! # Usage
//!
//! ```rust
//! use agui_core::encoder::{EventEncoder, SseEncoder};
//! use agui_core::sequencer::Sequencer;
//! use agui_core::{RunFinishedEvent, RunStartedEvent};
//!
//! let mut sequencer = Sequencer::new();
//! for event in [
//!     RunStartedEvent::new("t1", "r1").into(),
//!     RunFinishedEvent::new("t1", "r1").into(),
//! ] {
//!     let accepted = sequencer.push(event).unwrap();
//!     let frame = SseEncoder.encode(&accepted.event).unwrap();
//!     assert!(frame.starts_with("data: "));
//! }
//! assert!(sequencer.report().is_clean());
//! ```

pub mod encoder;
pub mod error;
pub mod event;
pub mod machine;
pub mod patch;
pub mod sequencer;
pub mod state;
pub mod types;

pub use error::{ProtocolError, Result};

/// Re-export serde_json::Value for consistent JSON handling across the crate
pub use serde_json::Value as JsonValue;

pub use types::*;

pub use encoder::{EncoderKind, EventEncoder, MessageEncoder, SseDecoder, SseEncoder};
pub use machine::{RunContext, RunPhase, RunTranscript, Transition};
pub use sequencer::{Accepted, Diagnostic, Rejection, RunReport, Sequencer, ViolationPolicy};
pub use state::{StateManager, StateSynchronizer, diff_states};

pub use event::{
    // Foundation types
    BaseEvent, Event, EventType,
    // Run lifecycle events
    InterruptInfo, RunErrorEvent, RunFinishedEvent, RunFinishedOutcome, RunStartedEvent,
    // Text message events
    TextMessageChunkEvent, TextMessageContentEvent, TextMessageEndEvent, TextMessageStartEvent,
    // Thinking events
    ThinkingEndEvent, ThinkingStartEvent, ThinkingTextMessageContentEvent,
    ThinkingTextMessageEndEvent, ThinkingTextMessageStartEvent,
    // Tool call events
    ToolCallArgsEvent, ToolCallChunkEvent, ToolCallEndEvent, ToolCallStartEvent,
    // State events
    MessagesSnapshotEvent, StateDeltaEvent, StateSnapshotEvent,
    // Step events
    StepFinishedEvent, StepStartedEvent,
    // Escape hatches
    CustomEvent, RawEvent,
};
