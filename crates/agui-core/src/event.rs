//! AG-UI Event Types
//!
//! This module defines the closed set of protocol events:
//! - Run lifecycle events (started, finished, error)
//! - Text message events (start, content, end, chunk)
//! - Thinking events (segment start/end, thinking text start/content/end)
//! - Tool call events (start, args, end, chunk)
//! - State events (snapshot, delta, messages snapshot)
//! - Step events (started, finished)
//! - Escape hatches (raw, custom)
//!
//! Events are immutable once built. Decoding from JSON goes through
//! [`Event::from_json`] / [`Event::from_value`], which report a
//! [`MalformedEventError`] naming the offending field instead of a bare serde
//! error.

use std::collections::HashSet;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::JsonValue;
use crate::error::MalformedEventError;
use crate::patch::PatchOperation;
use crate::types::{Message, MessageId, Role, RunId, ThreadId, ToolCallId};

/// Event types for the AG-UI protocol.
///
/// Event types are serialized using SCREAMING_SNAKE_CASE (e.g., `TEXT_MESSAGE_START`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Agent run has started.
    RunStarted,
    /// Agent run has finished.
    RunFinished,
    /// Agent run encountered an error.
    RunError,
    /// Start of a text message.
    TextMessageStart,
    /// Content delta of a text message.
    TextMessageContent,
    /// End of a text message.
    TextMessageEnd,
    /// Self-opening text message fragment.
    TextMessageChunk,
    /// Start of a thinking segment.
    ThinkingStart,
    /// Start of a thinking text message inside a segment.
    ThinkingTextMessageStart,
    /// Content delta of a thinking text message.
    ThinkingTextMessageContent,
    /// End of a thinking text message.
    ThinkingTextMessageEnd,
    /// End of a thinking segment.
    ThinkingEnd,
    /// Start of a tool call.
    ToolCallStart,
    /// Arguments delta for a tool call.
    ToolCallArgs,
    /// End of a tool call.
    ToolCallEnd,
    /// Self-opening tool call fragment.
    ToolCallChunk,
    /// Complete state snapshot.
    StateSnapshot,
    /// Incremental state update (JSON Patch RFC 6902).
    StateDelta,
    /// Complete message history snapshot.
    MessagesSnapshot,
    /// A step within a run has started.
    StepStarted,
    /// A step within a run has finished.
    StepFinished,
    /// Raw event from the underlying provider.
    Raw,
    /// Custom application-specific event.
    Custom,
}

impl EventType {
    /// Every tag, in declaration order.
    pub const ALL: [EventType; 23] = [
        EventType::RunStarted,
        EventType::RunFinished,
        EventType::RunError,
        EventType::TextMessageStart,
        EventType::TextMessageContent,
        EventType::TextMessageEnd,
        EventType::TextMessageChunk,
        EventType::ThinkingStart,
        EventType::ThinkingTextMessageStart,
        EventType::ThinkingTextMessageContent,
        EventType::ThinkingTextMessageEnd,
        EventType::ThinkingEnd,
        EventType::ToolCallStart,
        EventType::ToolCallArgs,
        EventType::ToolCallEnd,
        EventType::ToolCallChunk,
        EventType::StateSnapshot,
        EventType::StateDelta,
        EventType::MessagesSnapshot,
        EventType::StepStarted,
        EventType::StepFinished,
        EventType::Raw,
        EventType::Custom,
    ];

    /// Returns the string representation of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::RunStarted => "RUN_STARTED",
            EventType::RunFinished => "RUN_FINISHED",
            EventType::RunError => "RUN_ERROR",
            EventType::TextMessageStart => "TEXT_MESSAGE_START",
            EventType::TextMessageContent => "TEXT_MESSAGE_CONTENT",
            EventType::TextMessageEnd => "TEXT_MESSAGE_END",
            EventType::TextMessageChunk => "TEXT_MESSAGE_CHUNK",
            EventType::ThinkingStart => "THINKING_START",
            EventType::ThinkingTextMessageStart => "THINKING_TEXT_MESSAGE_START",
            EventType::ThinkingTextMessageContent => "THINKING_TEXT_MESSAGE_CONTENT",
            EventType::ThinkingTextMessageEnd => "THINKING_TEXT_MESSAGE_END",
            EventType::ThinkingEnd => "THINKING_END",
            EventType::ToolCallStart => "TOOL_CALL_START",
            EventType::ToolCallArgs => "TOOL_CALL_ARGS",
            EventType::ToolCallEnd => "TOOL_CALL_END",
            EventType::ToolCallChunk => "TOOL_CALL_CHUNK",
            EventType::StateSnapshot => "STATE_SNAPSHOT",
            EventType::StateDelta => "STATE_DELTA",
            EventType::MessagesSnapshot => "MESSAGES_SNAPSHOT",
            EventType::StepStarted => "STEP_STARTED",
            EventType::StepFinished => "STEP_FINISHED",
            EventType::Raw => "RAW",
            EventType::Custom => "CUSTOM",
        }
    }

    /// Wire fields that must be present for this tag.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            EventType::RunStarted | EventType::RunFinished => &["threadId", "runId"],
            EventType::RunError => &["message"],
            EventType::TextMessageStart | EventType::TextMessageEnd => &["messageId"],
            EventType::TextMessageContent => &["messageId", "delta"],
            EventType::ThinkingTextMessageContent => &["delta"],
            EventType::ToolCallStart => &["toolCallId", "toolCallName"],
            EventType::ToolCallArgs => &["toolCallId", "delta"],
            EventType::ToolCallEnd => &["toolCallId"],
            EventType::StateSnapshot => &["snapshot"],
            EventType::StateDelta => &["delta"],
            EventType::MessagesSnapshot => &["messages"],
            EventType::StepStarted | EventType::StepFinished => &["stepName"],
            EventType::Raw => &["event"],
            EventType::Custom => &["name", "value"],
            EventType::TextMessageChunk
            | EventType::ThinkingStart
            | EventType::ThinkingTextMessageStart
            | EventType::ThinkingTextMessageEnd
            | EventType::ThinkingEnd
            | EventType::ToolCallChunk => &[],
        }
    }

    /// `RAW` and `CUSTOM` carry opaque payloads and skip ordering checks.
    pub fn is_escape_hatch(&self) -> bool {
        matches!(self, EventType::Raw | EventType::Custom)
    }

    /// `RUN_FINISHED` and `RUN_ERROR`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventType::RunFinished | EventType::RunError)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventType {
    type Err = MalformedEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MalformedEventError::invalid(None, "type", format!("unknown event type `{s}`")))
    }
}

/// Milliseconds since the Unix epoch, saturating to 0 on clock error.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Base event structure for all AG-UI protocol events.
///
/// Contains common fields that are present in all event types.
/// Individual event structs flatten this into their structure.
///
/// # Fields
///
/// - `timestamp`: Optional Unix timestamp in milliseconds since epoch
/// - `raw_event`: Optional raw event from the underlying provider (for debugging/passthrough)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BaseEvent {
    /// Unix timestamp in milliseconds since epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    /// Raw event from the underlying provider (for debugging/passthrough).
    #[serde(rename = "rawEvent", skip_serializing_if = "Option::is_none")]
    pub raw_event: Option<JsonValue>,
}

impl BaseEvent {
    /// Creates a new empty BaseEvent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a BaseEvent with the current timestamp.
    pub fn with_current_timestamp() -> Self {
        Self {
            timestamp: Some(now_millis()),
            raw_event: None,
        }
    }

    /// Sets the timestamp for this event.
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the raw event for this event.
    pub fn raw_event(mut self, raw_event: JsonValue) -> Self {
        self.raw_event = Some(raw_event);
        self
    }
}

/// Adds the `with_timestamp` / `with_raw_event` builders shared by every event.
macro_rules! base_builders {
    ($($event:ty),* $(,)?) => {
        $(
            impl $event {
                /// Sets the timestamp for this event.
                pub fn with_timestamp(mut self, timestamp: u64) -> Self {
                    self.base.timestamp = Some(timestamp);
                    self
                }

                /// Sets the raw event for this event.
                pub fn with_raw_event(mut self, raw_event: JsonValue) -> Self {
                    self.base.raw_event = Some(raw_event);
                    self
                }
            }
        )*
    };
}

// =============================================================================
// Run Lifecycle Events
// =============================================================================

/// Event indicating that a run has started.
///
/// A run represents a single agent execution that may produce many events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStartedEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// The thread ID this run belongs to.
    #[serde(rename = "threadId")]
    pub thread_id: ThreadId,
    /// Unique identifier for this run.
    #[serde(rename = "runId")]
    pub run_id: RunId,
}

impl RunStartedEvent {
    /// Creates a new RunStartedEvent.
    pub fn new(thread_id: impl Into<ThreadId>, run_id: impl Into<RunId>) -> Self {
        Self {
            base: BaseEvent::default(),
            thread_id: thread_id.into(),
            run_id: run_id.into(),
        }
    }
}

/// Outcome of a run finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunFinishedOutcome {
    /// Run completed successfully.
    #[default]
    Success,
    /// Run was interrupted and requires human input to continue.
    Interrupt,
}

impl RunFinishedOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunFinishedOutcome::Success => "success",
            RunFinishedOutcome::Interrupt => "interrupt",
        }
    }
}

impl std::fmt::Display for RunFinishedOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Information about a run interrupt.
///
/// # Example
///
/// ```rust
/// use agui_core::InterruptInfo;
///
/// let info = InterruptInfo::new()
///     .with_id("approval-001")
///     .with_reason("human_approval")
///     .with_payload(serde_json::json!({"action": "DELETE"}));
/// assert_eq!(info.reason.as_deref(), Some("human_approval"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InterruptInfo {
    /// Identifier for tracking this interrupt across resume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Why the interrupt occurred ("human_approval", "upload_required", ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Context for the interrupt UI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<JsonValue>,
}

impl InterruptInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Event indicating that a run has finished.
///
/// The run must still be active and the IDs must match the ones announced by
/// `RUN_STARTED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFinishedEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// The thread ID this run belongs to.
    #[serde(rename = "threadId")]
    pub thread_id: ThreadId,
    /// The run ID that finished.
    #[serde(rename = "runId")]
    pub run_id: RunId,
    /// Optional result value from the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    /// Outcome of the run. Inferred from `interrupt` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RunFinishedOutcome>,
    /// Interrupt information when the run stopped for human input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt: Option<InterruptInfo>,
}

impl RunFinishedEvent {
    /// Creates a new RunFinishedEvent.
    pub fn new(thread_id: impl Into<ThreadId>, run_id: impl Into<RunId>) -> Self {
        Self {
            base: BaseEvent::default(),
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            result: None,
            outcome: None,
            interrupt: None,
        }
    }

    /// Sets the result for this event.
    pub fn with_result(mut self, result: JsonValue) -> Self {
        self.result = Some(result);
        self
    }

    /// Sets the interrupt info (implies Interrupt outcome).
    pub fn with_interrupt(mut self, interrupt: InterruptInfo) -> Self {
        self.outcome = Some(RunFinishedOutcome::Interrupt);
        self.interrupt = Some(interrupt);
        self
    }

    /// Returns the explicit outcome, or infers it from `interrupt`.
    pub fn effective_outcome(&self) -> RunFinishedOutcome {
        self.outcome.unwrap_or(if self.interrupt.is_some() {
            RunFinishedOutcome::Interrupt
        } else {
            RunFinishedOutcome::Success
        })
    }
}

/// Event indicating that a run has failed.
///
/// Always legal in an active run; abandons whatever is still open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunErrorEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// Error message describing what went wrong.
    pub message: String,
    /// Optional error code for programmatic handling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl RunErrorEvent {
    /// Creates a new RunErrorEvent.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            base: BaseEvent::default(),
            message: message.into(),
            code: None,
        }
    }

    /// Sets the error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

// =============================================================================
// Text Message Events
// =============================================================================

/// Event indicating the start of a text message.
///
/// # Example
///
/// ```rust
/// use agui_core::{Role, TextMessageStartEvent};
///
/// let event = TextMessageStartEvent::new("m1");
/// assert_eq!(event.role, Role::Assistant);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessageStartEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// Unique identifier for this message.
    #[serde(rename = "messageId")]
    pub message_id: MessageId,
    /// The role of the message sender.
    #[serde(default)]
    pub role: Role,
}

impl TextMessageStartEvent {
    /// Creates a new assistant TextMessageStartEvent.
    pub fn new(message_id: impl Into<MessageId>) -> Self {
        Self {
            base: BaseEvent::default(),
            message_id: message_id.into(),
            role: Role::Assistant,
        }
    }

    /// Sets the role of the message sender.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

/// Event containing a piece of text message content.
///
/// The delta must not be empty; [`Event::validate`] rejects empty deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessageContentEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// The message ID this content belongs to.
    #[serde(rename = "messageId")]
    pub message_id: MessageId,
    /// The text content delta to append.
    pub delta: String,
}

impl TextMessageContentEvent {
    /// Creates a new TextMessageContentEvent.
    pub fn new(message_id: impl Into<MessageId>, delta: impl Into<String>) -> Self {
        Self {
            base: BaseEvent::default(),
            message_id: message_id.into(),
            delta: delta.into(),
        }
    }
}

/// Event indicating the end of a text message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessageEndEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// The message ID that has completed.
    #[serde(rename = "messageId")]
    pub message_id: MessageId,
}

impl TextMessageEndEvent {
    /// Creates a new TextMessageEndEvent.
    pub fn new(message_id: impl Into<MessageId>) -> Self {
        Self {
            base: BaseEvent::default(),
            message_id: message_id.into(),
        }
    }
}

/// Self-opening text message fragment.
///
/// The first chunk for an unseen `messageId` opens the message; a chunk
/// without `messageId` continues the message the previous chunk opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TextMessageChunkEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// Message ID (may be omitted for continuation chunks).
    #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    /// Role of the sender; assistant when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Text content delta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
}

impl TextMessageChunkEvent {
    /// Creates an empty chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the message ID for this event.
    pub fn with_message_id(mut self, message_id: impl Into<MessageId>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Sets the role for this event.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Sets the delta for this event.
    pub fn with_delta(mut self, delta: impl Into<String>) -> Self {
        self.delta = Some(delta.into());
        self
    }
}

// =============================================================================
// Thinking Events
// =============================================================================

/// Opens a thinking segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ThinkingStartEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// Optional title shown for the segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ThinkingStartEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Closes a thinking segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ThinkingEndEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
}

impl ThinkingEndEvent {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Opens the text message of the current thinking segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ThinkingTextMessageStartEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
}

impl ThinkingTextMessageStartEvent {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Thinking content delta. Empty deltas are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingTextMessageContentEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// The thinking content delta.
    pub delta: String,
}

impl ThinkingTextMessageContentEvent {
    pub fn new(delta: impl Into<String>) -> Self {
        Self {
            base: BaseEvent::default(),
            delta: delta.into(),
        }
    }
}

/// Closes the text message of the current thinking segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ThinkingTextMessageEndEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
}

impl ThinkingTextMessageEndEvent {
    pub fn new() -> Self {
        Self::default()
    }
}

// =============================================================================
// Tool Call Events
// =============================================================================

/// Event indicating the start of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallStartEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// Unique identifier for this tool call.
    #[serde(rename = "toolCallId")]
    pub tool_call_id: ToolCallId,
    /// Name of the tool being called.
    #[serde(rename = "toolCallName")]
    pub tool_call_name: String,
    /// Message this tool call belongs to.
    #[serde(rename = "parentMessageId", default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<MessageId>,
}

impl ToolCallStartEvent {
    /// Creates a new ToolCallStartEvent.
    pub fn new(tool_call_id: impl Into<ToolCallId>, tool_call_name: impl Into<String>) -> Self {
        Self {
            base: BaseEvent::default(),
            tool_call_id: tool_call_id.into(),
            tool_call_name: tool_call_name.into(),
            parent_message_id: None,
        }
    }

    /// Links the tool call to a parent message.
    pub fn with_parent_message_id(mut self, message_id: impl Into<MessageId>) -> Self {
        self.parent_message_id = Some(message_id.into());
        self
    }
}

/// Arguments delta for a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallArgsEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// The tool call ID.
    #[serde(rename = "toolCallId")]
    pub tool_call_id: ToolCallId,
    /// Argument text to append.
    pub delta: String,
}

impl ToolCallArgsEvent {
    /// Creates a new ToolCallArgsEvent.
    pub fn new(tool_call_id: impl Into<ToolCallId>, delta: impl Into<String>) -> Self {
        Self {
            base: BaseEvent::default(),
            tool_call_id: tool_call_id.into(),
            delta: delta.into(),
        }
    }
}

/// Event indicating the end of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallEndEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// The tool call ID that has completed.
    #[serde(rename = "toolCallId")]
    pub tool_call_id: ToolCallId,
}

impl ToolCallEndEvent {
    /// Creates a new ToolCallEndEvent.
    pub fn new(tool_call_id: impl Into<ToolCallId>) -> Self {
        Self {
            base: BaseEvent::default(),
            tool_call_id: tool_call_id.into(),
        }
    }
}

/// Self-opening tool call fragment.
///
/// The first chunk for an unseen `toolCallId` must name the tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ToolCallChunkEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// Tool call ID (may be omitted for continuation chunks).
    #[serde(rename = "toolCallId", default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<ToolCallId>,
    /// Tool name, required when the chunk opens the call.
    #[serde(rename = "toolCallName", default, skip_serializing_if = "Option::is_none")]
    pub tool_call_name: Option<String>,
    /// Message this tool call belongs to.
    #[serde(rename = "parentMessageId", default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<MessageId>,
    /// Argument text to append.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
}

impl ToolCallChunkEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool_call_id(mut self, tool_call_id: impl Into<ToolCallId>) -> Self {
        self.tool_call_id = Some(tool_call_id.into());
        self
    }

    pub fn with_tool_call_name(mut self, name: impl Into<String>) -> Self {
        self.tool_call_name = Some(name.into());
        self
    }

    pub fn with_parent_message_id(mut self, message_id: impl Into<MessageId>) -> Self {
        self.parent_message_id = Some(message_id.into());
        self
    }

    pub fn with_delta(mut self, delta: impl Into<String>) -> Self {
        self.delta = Some(delta.into());
        self
    }
}

// =============================================================================
// State Events
// =============================================================================

/// Complete replacement of the application state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshotEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// The new state value.
    pub snapshot: JsonValue,
}

impl StateSnapshotEvent {
    pub fn new(snapshot: JsonValue) -> Self {
        Self {
            base: BaseEvent::default(),
            snapshot,
        }
    }
}

/// Ordered RFC 6902 operations against the last known state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDeltaEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// Patch operations, one JSON object each.
    pub delta: Vec<JsonValue>,
}

impl StateDeltaEvent {
    pub fn new(delta: Vec<JsonValue>) -> Self {
        Self {
            base: BaseEvent::default(),
            delta,
        }
    }

    /// Parses the delta into typed patch operations.
    ///
    /// Fails on the first entry that is not a valid RFC 6902 operation,
    /// naming it as `delta[i]`.
    pub fn operations(&self) -> Result<Vec<PatchOperation>, MalformedEventError> {
        self.delta
            .iter()
            .enumerate()
            .map(|(i, op)| {
                PatchOperation::deserialize(op).map_err(|e| {
                    MalformedEventError::invalid(
                        Some(EventType::StateDelta),
                        format!("delta[{i}]"),
                        e.to_string(),
                    )
                })
            })
            .collect()
    }
}

/// Complete replacement of the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesSnapshotEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// The full message history.
    pub messages: Vec<Message>,
}

impl MessagesSnapshotEvent {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            base: BaseEvent::default(),
            messages,
        }
    }
}

// =============================================================================
// Step Events
// =============================================================================

/// Pushes a named step frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepStartedEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// Name of the step.
    #[serde(rename = "stepName")]
    pub step_name: String,
}

impl StepStartedEvent {
    pub fn new(step_name: impl Into<String>) -> Self {
        Self {
            base: BaseEvent::default(),
            step_name: step_name.into(),
        }
    }
}

/// Pops the top step frame, which must carry the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFinishedEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// Name of the step.
    #[serde(rename = "stepName")]
    pub step_name: String,
}

impl StepFinishedEvent {
    pub fn new(step_name: impl Into<String>) -> Self {
        Self {
            base: BaseEvent::default(),
            step_name: step_name.into(),
        }
    }
}

// =============================================================================
// Escape Hatches
// =============================================================================

/// Event containing raw data from the underlying provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// The raw event data.
    pub event: JsonValue,
    /// Optional source identifier for the raw event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl RawEvent {
    pub fn new(event: JsonValue) -> Self {
        Self {
            base: BaseEvent::default(),
            event,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Event for custom application-specific data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomEvent {
    /// Common event fields (timestamp, rawEvent).
    #[serde(flatten)]
    pub base: BaseEvent,
    /// Name of the custom event.
    pub name: String,
    /// Custom event payload.
    pub value: JsonValue,
}

impl CustomEvent {
    pub fn new(name: impl Into<String>, value: JsonValue) -> Self {
        Self {
            base: BaseEvent::default(),
            name: name.into(),
            value,
        }
    }
}

base_builders!(
    RunStartedEvent,
    RunFinishedEvent,
    RunErrorEvent,
    TextMessageStartEvent,
    TextMessageContentEvent,
    TextMessageEndEvent,
    TextMessageChunkEvent,
    ThinkingStartEvent,
    ThinkingEndEvent,
    ThinkingTextMessageStartEvent,
    ThinkingTextMessageContentEvent,
    ThinkingTextMessageEndEvent,
    ToolCallStartEvent,
    ToolCallArgsEvent,
    ToolCallEndEvent,
    ToolCallChunkEvent,
    StateSnapshotEvent,
    StateDeltaEvent,
    MessagesSnapshotEvent,
    StepStartedEvent,
    StepFinishedEvent,
    RawEvent,
    CustomEvent,
);

// =============================================================================
// Event Union
// =============================================================================

/// Union of all events in the protocol.
///
/// Serialized as a JSON object with a `type` discriminant:
/// ```json
/// {"type": "TEXT_MESSAGE_START", "messageId": "m1", "role": "assistant"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    RunStarted(RunStartedEvent),
    RunFinished(RunFinishedEvent),
    RunError(RunErrorEvent),
    TextMessageStart(TextMessageStartEvent),
    TextMessageContent(TextMessageContentEvent),
    TextMessageEnd(TextMessageEndEvent),
    TextMessageChunk(TextMessageChunkEvent),
    ThinkingStart(ThinkingStartEvent),
    ThinkingTextMessageStart(ThinkingTextMessageStartEvent),
    ThinkingTextMessageContent(ThinkingTextMessageContentEvent),
    ThinkingTextMessageEnd(ThinkingTextMessageEndEvent),
    ThinkingEnd(ThinkingEndEvent),
    ToolCallStart(ToolCallStartEvent),
    ToolCallArgs(ToolCallArgsEvent),
    ToolCallEnd(ToolCallEndEvent),
    ToolCallChunk(ToolCallChunkEvent),
    StateSnapshot(StateSnapshotEvent),
    StateDelta(StateDeltaEvent),
    MessagesSnapshot(MessagesSnapshotEvent),
    StepStarted(StepStartedEvent),
    StepFinished(StepFinishedEvent),
    Raw(RawEvent),
    Custom(CustomEvent),
}

impl Event {
    /// Returns the event type for this event.
    pub fn event_type(&self) -> EventType {
        match self {
            Event::RunStarted(_) => EventType::RunStarted,
            Event::RunFinished(_) => EventType::RunFinished,
            Event::RunError(_) => EventType::RunError,
            Event::TextMessageStart(_) => EventType::TextMessageStart,
            Event::TextMessageContent(_) => EventType::TextMessageContent,
            Event::TextMessageEnd(_) => EventType::TextMessageEnd,
            Event::TextMessageChunk(_) => EventType::TextMessageChunk,
            Event::ThinkingStart(_) => EventType::ThinkingStart,
            Event::ThinkingTextMessageStart(_) => EventType::ThinkingTextMessageStart,
            Event::ThinkingTextMessageContent(_) => EventType::ThinkingTextMessageContent,
            Event::ThinkingTextMessageEnd(_) => EventType::ThinkingTextMessageEnd,
            Event::ThinkingEnd(_) => EventType::ThinkingEnd,
            Event::ToolCallStart(_) => EventType::ToolCallStart,
            Event::ToolCallArgs(_) => EventType::ToolCallArgs,
            Event::ToolCallEnd(_) => EventType::ToolCallEnd,
            Event::ToolCallChunk(_) => EventType::ToolCallChunk,
            Event::StateSnapshot(_) => EventType::StateSnapshot,
            Event::StateDelta(_) => EventType::StateDelta,
            Event::MessagesSnapshot(_) => EventType::MessagesSnapshot,
            Event::StepStarted(_) => EventType::StepStarted,
            Event::StepFinished(_) => EventType::StepFinished,
            Event::Raw(_) => EventType::Raw,
            Event::Custom(_) => EventType::Custom,
        }
    }

    /// Returns the common fields of this event.
    pub fn base(&self) -> &BaseEvent {
        match self {
            Event::RunStarted(e) => &e.base,
            Event::RunFinished(e) => &e.base,
            Event::RunError(e) => &e.base,
            Event::TextMessageStart(e) => &e.base,
            Event::TextMessageContent(e) => &e.base,
            Event::TextMessageEnd(e) => &e.base,
            Event::TextMessageChunk(e) => &e.base,
            Event::ThinkingStart(e) => &e.base,
            Event::ThinkingTextMessageStart(e) => &e.base,
            Event::ThinkingTextMessageContent(e) => &e.base,
            Event::ThinkingTextMessageEnd(e) => &e.base,
            Event::ThinkingEnd(e) => &e.base,
            Event::ToolCallStart(e) => &e.base,
            Event::ToolCallArgs(e) => &e.base,
            Event::ToolCallEnd(e) => &e.base,
            Event::ToolCallChunk(e) => &e.base,
            Event::StateSnapshot(e) => &e.base,
            Event::StateDelta(e) => &e.base,
            Event::MessagesSnapshot(e) => &e.base,
            Event::StepStarted(e) => &e.base,
            Event::StepFinished(e) => &e.base,
            Event::Raw(e) => &e.base,
            Event::Custom(e) => &e.base,
        }
    }

    /// Returns the timestamp of this event if available.
    pub fn timestamp(&self) -> Option<u64> {
        self.base().timestamp
    }

    /// The message, tool call, step or run identifier the event refers to.
    pub fn subject_id(&self) -> Option<&str> {
        match self {
            Event::RunStarted(e) => Some(e.run_id.as_str()),
            Event::RunFinished(e) => Some(e.run_id.as_str()),
            Event::TextMessageStart(e) => Some(e.message_id.as_str()),
            Event::TextMessageContent(e) => Some(e.message_id.as_str()),
            Event::TextMessageEnd(e) => Some(e.message_id.as_str()),
            Event::TextMessageChunk(e) => e.message_id.as_deref(),
            Event::ToolCallStart(e) => Some(e.tool_call_id.as_str()),
            Event::ToolCallArgs(e) => Some(e.tool_call_id.as_str()),
            Event::ToolCallEnd(e) => Some(e.tool_call_id.as_str()),
            Event::ToolCallChunk(e) => e.tool_call_id.as_deref(),
            Event::StepStarted(e) => Some(e.step_name.as_str()),
            Event::StepFinished(e) => Some(e.step_name.as_str()),
            Event::Custom(e) => Some(e.name.as_str()),
            _ => None,
        }
    }

    /// Checks the field rules typing alone cannot express.
    ///
    /// Identifiers and step names must be non-empty, text content deltas must
    /// be non-empty, every state delta entry must be an RFC 6902 operation and
    /// message snapshots must not repeat an ID.
    pub fn validate(&self) -> Result<(), MalformedEventError> {
        let t = self.event_type();
        match self {
            Event::RunStarted(e) => {
                non_empty(t, "threadId", &e.thread_id)?;
                non_empty(t, "runId", &e.run_id)
            }
            Event::RunFinished(e) => {
                non_empty(t, "threadId", &e.thread_id)?;
                non_empty(t, "runId", &e.run_id)
            }
            Event::TextMessageStart(e) => non_empty(t, "messageId", &e.message_id),
            Event::TextMessageContent(e) => {
                non_empty(t, "messageId", &e.message_id)?;
                non_empty(t, "delta", &e.delta)
            }
            Event::TextMessageEnd(e) => non_empty(t, "messageId", &e.message_id),
            Event::TextMessageChunk(e) => match &e.message_id {
                Some(id) => non_empty(t, "messageId", id),
                None => Ok(()),
            },
            Event::ToolCallStart(e) => {
                non_empty(t, "toolCallId", &e.tool_call_id)?;
                non_empty(t, "toolCallName", &e.tool_call_name)
            }
            Event::ToolCallArgs(e) => non_empty(t, "toolCallId", &e.tool_call_id),
            Event::ToolCallEnd(e) => non_empty(t, "toolCallId", &e.tool_call_id),
            Event::ToolCallChunk(e) => {
                if let Some(id) = &e.tool_call_id {
                    non_empty(t, "toolCallId", id)?;
                }
                match &e.tool_call_name {
                    Some(name) => non_empty(t, "toolCallName", name),
                    None => Ok(()),
                }
            }
            Event::StateDelta(e) => e.operations().map(|_| ()),
            Event::MessagesSnapshot(e) => {
                let mut seen = HashSet::new();
                for (i, message) in e.messages.iter().enumerate() {
                    non_empty(t, &format!("messages[{i}].id"), message.id())?;
                    if !seen.insert(message.id().as_str()) {
                        return Err(MalformedEventError::invalid(
                            Some(t),
                            format!("messages[{i}].id"),
                            format!("duplicate message id `{}`", message.id()),
                        ));
                    }
                }
                Ok(())
            }
            Event::StepStarted(e) => non_empty(t, "stepName", &e.step_name),
            Event::StepFinished(e) => non_empty(t, "stepName", &e.step_name),
            Event::Custom(e) => non_empty(t, "name", &e.name),
            Event::RunError(_)
            | Event::ThinkingStart(_)
            | Event::ThinkingTextMessageStart(_)
            | Event::ThinkingTextMessageContent(_)
            | Event::ThinkingTextMessageEnd(_)
            | Event::ThinkingEnd(_)
            | Event::StateSnapshot(_)
            | Event::Raw(_) => Ok(()),
        }
    }

    /// Decodes and validates a candidate event from JSON text.
    pub fn from_json(text: &str) -> Result<Self, MalformedEventError> {
        let value: JsonValue = serde_json::from_str(text)
            .map_err(|e| MalformedEventError::invalid(None, "event", e.to_string()))?;
        Self::from_value(value)
    }

    /// Decodes and validates a candidate event from a JSON value.
    ///
    /// Checks, in order: the value is an object, `type` names a known tag,
    /// every field the tag requires is present, the fields have the right
    /// shape, then [`Event::validate`].
    pub fn from_value(value: JsonValue) -> Result<Self, MalformedEventError> {
        let event_type = {
            let object = value.as_object().ok_or_else(|| {
                MalformedEventError::invalid(None, "event", "expected a JSON object")
            })?;
            let event_type = match object.get("type") {
                None => return Err(MalformedEventError::missing(None, "type")),
                Some(JsonValue::String(tag)) => tag.parse::<EventType>()?,
                Some(other) => {
                    return Err(MalformedEventError::invalid(
                        None,
                        "type",
                        format!("expected a string, found {other}"),
                    ));
                }
            };
            if let Some(field) = event_type
                .required_fields()
                .iter()
                .find(|field| !object.contains_key(**field))
            {
                return Err(MalformedEventError::missing(Some(event_type), *field));
            }
            // flattened into BaseEvent, where the decode path is lost
            if let Some(timestamp) = object
                .get("timestamp")
                .filter(|timestamp| !timestamp.is_null() && !timestamp.is_u64())
            {
                return Err(MalformedEventError::invalid(
                    Some(event_type),
                    "timestamp",
                    format!("expected milliseconds since epoch, found {timestamp}"),
                ));
            }
            event_type
        };

        let event = match event_type {
            EventType::RunStarted => Event::RunStarted(decode_as(event_type, value)?),
            EventType::RunFinished => Event::RunFinished(decode_as(event_type, value)?),
            EventType::RunError => Event::RunError(decode_as(event_type, value)?),
            EventType::TextMessageStart => Event::TextMessageStart(decode_as(event_type, value)?),
            EventType::TextMessageContent => {
                Event::TextMessageContent(decode_as(event_type, value)?)
            }
            EventType::TextMessageEnd => Event::TextMessageEnd(decode_as(event_type, value)?),
            EventType::TextMessageChunk => Event::TextMessageChunk(decode_as(event_type, value)?),
            EventType::ThinkingStart => Event::ThinkingStart(decode_as(event_type, value)?),
            EventType::ThinkingTextMessageStart => {
                Event::ThinkingTextMessageStart(decode_as(event_type, value)?)
            }
            EventType::ThinkingTextMessageContent => {
                Event::ThinkingTextMessageContent(decode_as(event_type, value)?)
            }
            EventType::ThinkingTextMessageEnd => {
                Event::ThinkingTextMessageEnd(decode_as(event_type, value)?)
            }
            EventType::ThinkingEnd => Event::ThinkingEnd(decode_as(event_type, value)?),
            EventType::ToolCallStart => Event::ToolCallStart(decode_as(event_type, value)?),
            EventType::ToolCallArgs => Event::ToolCallArgs(decode_as(event_type, value)?),
            EventType::ToolCallEnd => Event::ToolCallEnd(decode_as(event_type, value)?),
            EventType::ToolCallChunk => Event::ToolCallChunk(decode_as(event_type, value)?),
            EventType::StateSnapshot => Event::StateSnapshot(decode_as(event_type, value)?),
            EventType::StateDelta => Event::StateDelta(decode_as(event_type, value)?),
            EventType::MessagesSnapshot => Event::MessagesSnapshot(decode_as(event_type, value)?),
            EventType::StepStarted => Event::StepStarted(decode_as(event_type, value)?),
            EventType::StepFinished => Event::StepFinished(decode_as(event_type, value)?),
            EventType::Raw => Event::Raw(decode_as(event_type, value)?),
            EventType::Custom => Event::Custom(decode_as(event_type, value)?),
        };
        event.validate()?;
        Ok(event)
    }
}

/// Decodes one event body, reporting the wire path of the first bad field.
fn decode_as<T: DeserializeOwned>(
    event_type: EventType,
    value: JsonValue,
) -> Result<T, MalformedEventError> {
    serde_path_to_error::deserialize(value).map_err(|err| {
        let path = err.path().to_string();
        let field = if path == "." { "event".to_string() } else { path };
        MalformedEventError::invalid(Some(event_type), field, err.into_inner().to_string())
    })
}

fn non_empty(event_type: EventType, field: &str, value: &str) -> Result<(), MalformedEventError> {
    if value.is_empty() {
        Err(MalformedEventError::empty(event_type, field))
    } else {
        Ok(())
    }
}

macro_rules! impl_from_event {
    ($($variant:ident($event:ty)),* $(,)?) => {
        $(
            impl From<$event> for Event {
                fn from(event: $event) -> Self {
                    Event::$variant(event)
                }
            }
        )*
    };
}

impl_from_event!(
    RunStarted(RunStartedEvent),
    RunFinished(RunFinishedEvent),
    RunError(RunErrorEvent),
    TextMessageStart(TextMessageStartEvent),
    TextMessageContent(TextMessageContentEvent),
    TextMessageEnd(TextMessageEndEvent),
    TextMessageChunk(TextMessageChunkEvent),
    ThinkingStart(ThinkingStartEvent),
    ThinkingTextMessageStart(ThinkingTextMessageStartEvent),
    ThinkingTextMessageContent(ThinkingTextMessageContentEvent),
    ThinkingTextMessageEnd(ThinkingTextMessageEndEvent),
    ThinkingEnd(ThinkingEndEvent),
    ToolCallStart(ToolCallStartEvent),
    ToolCallArgs(ToolCallArgsEvent),
    ToolCallEnd(ToolCallEndEvent),
    ToolCallChunk(ToolCallChunkEvent),
    StateSnapshot(StateSnapshotEvent),
    StateDelta(StateDeltaEvent),
    MessagesSnapshot(MessagesSnapshotEvent),
    StepStarted(StepStartedEvent),
    StepFinished(StepFinishedEvent),
    Raw(RawEvent),
    Custom(CustomEvent),
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MalformedReason;
    use serde_json::json;

    #[test]
    fn test_event_type_serialization() {
        let json = serde_json::to_string(&EventType::TextMessageStart).unwrap();
        assert_eq!(json, "\"TEXT_MESSAGE_START\"");

        let json = serde_json::to_string(&EventType::ThinkingTextMessageContent).unwrap();
        assert_eq!(json, "\"THINKING_TEXT_MESSAGE_CONTENT\"");
    }

    #[test]
    fn test_event_type_as_str_matches_serde() {
        for t in EventType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
            assert_eq!(t.as_str().parse::<EventType>().unwrap(), t);
        }
    }

    #[test]
    fn test_unknown_event_type_rejected() {
        let err = "TOOL_CALL_RESULT".parse::<EventType>().unwrap_err();
        assert_eq!(err.field, "type");
    }

    #[test]
    fn test_escape_hatches_and_terminals() {
        assert!(EventType::Raw.is_escape_hatch());
        assert!(EventType::Custom.is_escape_hatch());
        assert!(!EventType::StateDelta.is_escape_hatch());
        assert!(EventType::RunError.is_terminal());
        assert!(!EventType::RunStarted.is_terminal());
    }

    #[test]
    fn test_base_event_serialization() {
        let base = BaseEvent::new().timestamp(1706123456789);
        let json = serde_json::to_string(&base).unwrap();
        assert_eq!(json, r#"{"timestamp":1706123456789}"#);
    }

    #[test]
    fn test_text_message_content_wire_shape() {
        let event: Event = TextMessageContentEvent::new("m1", "Hello")
            .with_timestamp(7)
            .into();
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"type":"TEXT_MESSAGE_CONTENT","timestamp":7,"messageId":"m1","delta":"Hello"}"#
        );
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let event: Event = ToolCallStartEvent::new("call_1", "search").into();
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("parentMessageId"));
        assert!(!json.contains("timestamp"));
        assert!(!json.contains("rawEvent"));
    }

    #[test]
    fn test_run_finished_outcome() {
        let finished = RunFinishedEvent::new("t1", "r1");
        assert_eq!(finished.effective_outcome(), RunFinishedOutcome::Success);

        let interrupted = RunFinishedEvent::new("t1", "r1")
            .with_interrupt(InterruptInfo::new().with_reason("human_approval"));
        assert_eq!(interrupted.effective_outcome(), RunFinishedOutcome::Interrupt);
        let json = serde_json::to_value(Event::from(interrupted)).unwrap();
        assert_eq!(json["outcome"], "interrupt");
        assert_eq!(json["interrupt"]["reason"], "human_approval");
    }

    #[test]
    fn test_from_value_missing_type() {
        let err = Event::from_value(json!({"messageId": "m1"})).unwrap_err();
        assert_eq!(err.event_type, None);
        assert_eq!(err.field, "type");
        assert_eq!(err.reason, MalformedReason::Missing);
    }

    #[test]
    fn test_from_value_not_an_object() {
        let err = Event::from_value(json!(["RUN_STARTED"])).unwrap_err();
        assert_eq!(err.field, "event");
    }

    #[test]
    fn test_from_value_missing_required_field() {
        let err = Event::from_value(json!({"type": "TEXT_MESSAGE_CONTENT", "delta": "x"}))
            .unwrap_err();
        assert_eq!(err.event_type, Some(EventType::TextMessageContent));
        assert_eq!(err.field, "messageId");
        assert_eq!(err.reason, MalformedReason::Missing);
    }

    #[test]
    fn test_from_value_wrong_field_type() {
        let err = Event::from_value(json!({"type": "STEP_STARTED", "stepName": 3})).unwrap_err();
        assert_eq!(err.event_type, Some(EventType::StepStarted));
        assert_eq!(err.field, "stepName");
        assert!(matches!(err.reason, MalformedReason::Invalid(_)));
    }

    #[test]
    fn test_from_value_names_nested_field() {
        let err = Event::from_value(json!({
            "type": "STATE_DELTA",
            "delta": [{"op": "add", "path": "/a", "value": 1}, 7]
        }))
        .unwrap_err();
        assert_eq!(err.event_type, Some(EventType::StateDelta));
        assert_eq!(err.field, "delta[1]");

        let err = Event::from_value(json!({
            "type": "RUN_STARTED", "threadId": "t1", "runId": "r1", "timestamp": "soon"
        }))
        .unwrap_err();
        assert_eq!(err.field, "timestamp");
    }

    #[test]
    fn test_from_json_rejects_empty_delta() {
        let err = Event::from_json(r#"{"type":"TEXT_MESSAGE_CONTENT","messageId":"m1","delta":""}"#)
            .unwrap_err();
        assert_eq!(err.field, "delta");
        assert_eq!(err.reason, MalformedReason::Empty);
    }

    #[test]
    fn test_from_json_accepts_minimal_chunk() {
        let event = Event::from_json(r#"{"type":"TEXT_MESSAGE_CHUNK","messageId":"m1","delta":"Hi"}"#)
            .unwrap();
        match event {
            Event::TextMessageChunk(chunk) => {
                assert_eq!(chunk.message_id.as_deref(), Some("m1"));
                assert_eq!(chunk.role, None);
                assert_eq!(chunk.delta.as_deref(), Some("Hi"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_text_message_start_role_defaults_to_assistant() {
        let event = Event::from_json(r#"{"type":"TEXT_MESSAGE_START","messageId":"m1"}"#).unwrap();
        match event {
            Event::TextMessageStart(start) => assert_eq!(start.role, Role::Assistant),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_state_delta_validation_names_operation() {
        let event: Event = StateDeltaEvent::new(vec![
            json!({"op": "add", "path": "/a", "value": 1}),
            json!({"op": "frobnicate", "path": "/b"}),
        ])
        .into();
        let err = event.validate().unwrap_err();
        assert_eq!(err.field, "delta[1]");
    }

    #[test]
    fn test_messages_snapshot_duplicate_ids() {
        let event: Event = MessagesSnapshotEvent::new(vec![
            Message::new(Role::User, "m1", "hi"),
            Message::new(Role::Assistant, "m1", "hello"),
        ])
        .into();
        let err = event.validate().unwrap_err();
        assert_eq!(err.field, "messages[1].id");
    }

    #[test]
    fn test_tool_call_start_requires_name() {
        let event: Event = ToolCallStartEvent::new("call_1", "").into();
        let err = event.validate().unwrap_err();
        assert_eq!(err.field, "toolCallName");
    }

    #[test]
    fn test_thinking_content_may_be_empty() {
        let event: Event = ThinkingTextMessageContentEvent::new("").into();
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_subject_id() {
        let event: Event = StepStartedEvent::new("plan").into();
        assert_eq!(event.subject_id(), Some("plan"));
        let event: Event = ThinkingEndEvent::new().into();
        assert_eq!(event.subject_id(), None);
    }

    #[test]
    fn test_raw_and_custom_decode() {
        let raw = Event::from_json(r#"{"type":"RAW","event":{"x":1},"source":"openai"}"#).unwrap();
        assert_eq!(raw.event_type(), EventType::Raw);

        let err = Event::from_json(r#"{"type":"CUSTOM","name":"ping"}"#).unwrap_err();
        assert_eq!(err.field, "value");
    }
}
