//! Producer-side helpers for emitting well-ordered events.
//!
//! Each helper owns one lifecycle and emits its opening event on `start`
//! and its closing event on `end`, so agent code cannot forget either half:
//!
//! - [`AgentSession`] - run lifecycle, errors and interrupts
//! - [`MessageStream`] - one streamed text message
//! - [`ToolCallStream`] - one streamed tool call
//! - [`ThinkingStep`] / [`ThinkingMessageStream`] - reasoning blocks
//! - [`StateStream`] - a snapshot followed by diff-based deltas
//!
//! Helpers only shape events; they do not validate. Wrap the sink in a
//! [`ValidatingSink`](crate::driver::ValidatingSink) for that.
//!
//! # Example
//!
//! ```rust,ignore
//! use agui_server::{transport::sse, AgentSession, MessageStream, ValidatingSink};
//!
//! async fn handle_request() -> impl IntoResponse {
//!     let (sender, handler) = sse::channel(32);
//!
//!     tokio::spawn(async move {
//!         let mut session = AgentSession::new(ValidatingSink::new(sender));
//!         session.start_run().await?;
//!
//!         let msg = MessageStream::start(session.sink()).await?;
//!         msg.content("Hello, ").await?;
//!         msg.content("world!").await?;
//!         msg.end().await?;
//!
//!         session.finish_run(None).await
//!     });
//!
//!     handler.into_response()
//! }
//! ```

use agui_core::error::OutOfSequenceEventError;
use agui_core::machine::RunPhase;
use agui_core::state::StateManager;
use agui_core::{
    EventType, InterruptInfo, JsonValue, MessageId, RunErrorEvent, RunFinishedEvent, RunId,
    RunStartedEvent, StateDeltaEvent, StateSnapshotEvent, StepFinishedEvent, StepStartedEvent,
    TextMessageContentEvent, TextMessageEndEvent, TextMessageStartEvent, ThinkingEndEvent,
    ThinkingStartEvent, ThinkingTextMessageContentEvent, ThinkingTextMessageEndEvent,
    ThinkingTextMessageStartEvent, ThreadId, ToolCallArgsEvent, ToolCallEndEvent, ToolCallId,
    ToolCallStartEvent,
};
use tracing::debug;

use crate::error::{Result, ServerError};
use crate::sink::EventSink;

/// Streams one text message piece by piece.
///
/// ```rust,ignore
/// let msg = MessageStream::start(&sink).await?;
/// msg.content("Hello, ").await?;
/// msg.content("world!").await?;
/// let message_id = msg.end().await?;
/// ```
pub struct MessageStream<'a, S: EventSink> {
    sink: &'a S,
    message_id: MessageId,
}

impl<'a, S: EventSink> MessageStream<'a, S> {
    /// Emits `TEXT_MESSAGE_START` with a random message ID.
    pub async fn start(sink: &'a S) -> Result<Self> {
        Self::start_with_id(sink, MessageId::random()).await
    }

    pub async fn start_with_id(sink: &'a S, message_id: MessageId) -> Result<Self> {
        sink.emit(TextMessageStartEvent::new(message_id.clone()).into())
            .await?;
        Ok(Self { sink, message_id })
    }

    /// Emits `TEXT_MESSAGE_CONTENT`.
    ///
    /// Empty deltas are illegal on the wire, so they are skipped here.
    pub async fn content(&self, delta: impl Into<String>) -> Result<()> {
        let delta = delta.into();
        if delta.is_empty() {
            return Ok(());
        }
        self.sink
            .emit(TextMessageContentEvent::new(self.message_id.clone(), delta).into())
            .await
    }

    /// Emits `TEXT_MESSAGE_END` and returns the message ID.
    pub async fn end(self) -> Result<MessageId> {
        self.sink
            .emit(TextMessageEndEvent::new(self.message_id.clone()).into())
            .await?;
        Ok(self.message_id)
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }
}

/// Streams one tool call and its argument fragments.
pub struct ToolCallStream<'a, S: EventSink> {
    sink: &'a S,
    tool_call_id: ToolCallId,
}

impl<'a, S: EventSink> ToolCallStream<'a, S> {
    /// Emits `TOOL_CALL_START` with a random tool call ID.
    pub async fn start(sink: &'a S, name: impl Into<String>) -> Result<Self> {
        Self::start_with_id(sink, ToolCallId::random(), name, None).await
    }

    /// Emits `TOOL_CALL_START`, optionally linked to the message that issued it.
    pub async fn start_with_id(
        sink: &'a S,
        tool_call_id: ToolCallId,
        name: impl Into<String>,
        parent_message_id: Option<MessageId>,
    ) -> Result<Self> {
        let mut event = ToolCallStartEvent::new(tool_call_id.clone(), name);
        if let Some(parent) = parent_message_id {
            event = event.with_parent_message_id(parent);
        }
        sink.emit(event.into()).await?;
        Ok(Self { sink, tool_call_id })
    }

    pub async fn args(&self, delta: impl Into<String>) -> Result<()> {
        self.sink
            .emit(ToolCallArgsEvent::new(self.tool_call_id.clone(), delta).into())
            .await
    }

    /// Emits `TOOL_CALL_END` and returns the tool call ID.
    pub async fn end(self) -> Result<ToolCallId> {
        self.sink
            .emit(ToolCallEndEvent::new(self.tool_call_id.clone()).into())
            .await?;
        Ok(self.tool_call_id)
    }

    pub fn tool_call_id(&self) -> &ToolCallId {
        &self.tool_call_id
    }
}

/// Streams the text of one thinking message.
///
/// Thinking messages carry no ID; at most one is open at a time.
pub struct ThinkingMessageStream<'a, S: EventSink> {
    sink: &'a S,
}

impl<'a, S: EventSink> ThinkingMessageStream<'a, S> {
    pub async fn start(sink: &'a S) -> Result<Self> {
        sink.emit(ThinkingTextMessageStartEvent::new().into()).await?;
        Ok(Self { sink })
    }

    /// Emits `THINKING_TEXT_MESSAGE_CONTENT`. Empty deltas are allowed.
    pub async fn content(&self, delta: impl Into<String>) -> Result<()> {
        self.sink
            .emit(ThinkingTextMessageContentEvent::new(delta).into())
            .await
    }

    pub async fn end(self) -> Result<()> {
        self.sink.emit(ThinkingTextMessageEndEvent::new().into()).await
    }
}

/// Brackets a thinking block with `THINKING_START` / `THINKING_END`.
///
/// ```rust,ignore
/// let step = ThinkingStep::start(&sink, Some("Analyzing user query")).await?;
/// let thinking = ThinkingMessageStream::start(step.sink()).await?;
/// thinking.content("First, let me consider...").await?;
/// thinking.end().await?;
/// step.end().await?;
/// ```
pub struct ThinkingStep<'a, S: EventSink> {
    sink: &'a S,
}

impl<'a, S: EventSink> ThinkingStep<'a, S> {
    pub async fn start(sink: &'a S, title: Option<impl Into<String>>) -> Result<Self> {
        let event = match title {
            Some(title) => ThinkingStartEvent::new().with_title(title),
            None => ThinkingStartEvent::new(),
        };
        sink.emit(event.into()).await?;
        Ok(Self { sink })
    }

    pub async fn end(self) -> Result<()> {
        self.sink.emit(ThinkingEndEvent::new().into()).await
    }

    /// The sink to emit thinking messages into.
    pub fn sink(&self) -> &'a S {
        self.sink
    }
}

/// Publishes application state as one snapshot followed by deltas.
///
/// Every update is diffed against the last published state through a
/// [`StateManager`]; unchanged updates emit nothing.
///
/// ```rust,ignore
/// let mut state = StateStream::start(&sink, json!({"count": 0})).await?;
/// state.update(json!({"count": 1})).await?;            // replace /count
/// state.update_with(|s| s["done"] = json!(true)).await?; // add /done
/// ```
pub struct StateStream<'a, S: EventSink> {
    sink: &'a S,
    manager: StateManager,
}

impl<'a, S: EventSink> StateStream<'a, S> {
    /// Emits `STATE_SNAPSHOT` with the initial state.
    pub async fn start(sink: &'a S, initial: JsonValue) -> Result<Self> {
        sink.emit(StateSnapshotEvent::new(initial.clone()).into())
            .await?;
        Ok(Self {
            sink,
            manager: StateManager::new(initial),
        })
    }

    /// Emits a `STATE_DELTA` moving the client to `new_state`.
    ///
    /// Returns whether anything was emitted.
    pub async fn update(&mut self, new_state: JsonValue) -> Result<bool> {
        let delta = self.manager.update(new_state);
        self.publish(delta).await
    }

    /// Mutates the state in place and emits the resulting delta.
    pub async fn update_with<F>(&mut self, f: F) -> Result<bool>
    where
        F: FnOnce(&mut JsonValue),
    {
        let delta = self.manager.update_with(f);
        self.publish(delta).await
    }

    /// Replaces the state wholesale with a fresh `STATE_SNAPSHOT`.
    pub async fn resync(&mut self, new_state: JsonValue) -> Result<()> {
        self.manager.reset(new_state);
        self.sink
            .emit(StateSnapshotEvent::new(self.manager.snapshot()).into())
            .await
    }

    pub fn current(&self) -> &JsonValue {
        self.manager.current()
    }

    /// Number of changes published since the stream started.
    pub fn version(&self) -> u64 {
        self.manager.version()
    }

    async fn publish(&self, delta: Option<Vec<JsonValue>>) -> Result<bool> {
        let Some(delta) = delta else {
            return Ok(false);
        };
        debug!(ops = delta.len(), version = self.manager.version(), "publishing state delta");
        self.sink.emit(StateDeltaEvent::new(delta).into()).await?;
        Ok(true)
    }
}

/// Run lifecycle for one thread.
///
/// ```rust,ignore
/// let mut session = AgentSession::new(sink);
/// let run_id = session.start_run().await?;
/// // ...
/// session.finish_run(Some(json!({"result": "success"}))).await?;
/// ```
pub struct AgentSession<S: EventSink> {
    sink: S,
    thread_id: ThreadId,
    current_run: Option<RunId>,
    open_steps: Vec<String>,
}

impl<S: EventSink> AgentSession<S> {
    /// Creates a session on a random thread ID.
    pub fn new(sink: S) -> Self {
        Self::with_thread_id(sink, ThreadId::random())
    }

    pub fn with_thread_id(sink: S, thread_id: ThreadId) -> Self {
        Self {
            sink,
            thread_id,
            current_run: None,
            open_steps: Vec::new(),
        }
    }

    /// Emits `RUN_STARTED` with a random run ID.
    ///
    /// Fails without emitting if a run is already in progress.
    pub async fn start_run(&mut self) -> Result<RunId> {
        self.start_run_with_id(RunId::random()).await
    }

    pub async fn start_run_with_id(&mut self, run_id: RunId) -> Result<RunId> {
        if let Some(current) = &self.current_run {
            return Err(ServerError::Core(
                OutOfSequenceEventError {
                    event_type: EventType::RunStarted,
                    id: Some(current.to_string()),
                    phase: RunPhase::Active,
                    reason: "a run is already in progress on this session".into(),
                }
                .into(),
            ));
        }
        self.sink
            .emit(RunStartedEvent::new(self.thread_id.clone(), run_id.clone()).into())
            .await?;
        self.current_run = Some(run_id.clone());
        Ok(run_id)
    }

    /// Emits `RUN_FINISHED` with an optional result.
    ///
    /// Does nothing if no run is in progress.
    pub async fn finish_run(&mut self, result: Option<JsonValue>) -> Result<()> {
        let Some(run_id) = self.end_run() else {
            return Ok(());
        };
        let mut event = RunFinishedEvent::new(self.thread_id.clone(), run_id);
        if let Some(result) = result {
            event = event.with_result(result);
        }
        self.sink.emit(event.into()).await
    }

    /// Emits `RUN_ERROR` and clears the current run.
    pub async fn run_error(&mut self, message: impl Into<String>) -> Result<()> {
        self.end_run();
        self.sink.emit(RunErrorEvent::new(message).into()).await
    }

    pub async fn run_error_with_code(
        &mut self,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Result<()> {
        self.end_run();
        self.sink
            .emit(RunErrorEvent::new(message).with_code(code).into())
            .await
    }

    /// Finishes the run with an interrupt outcome.
    ///
    /// The client is expected to collect human input and resume with a new
    /// run. Does nothing if no run is in progress.
    pub async fn interrupt(
        &mut self,
        reason: Option<impl Into<String>>,
        payload: Option<JsonValue>,
    ) -> Result<()> {
        self.interrupt_with(InterruptInfo::new(), reason, payload).await
    }

    /// Like [`interrupt`](Self::interrupt), with an ID the resume request can echo.
    pub async fn interrupt_with_id(
        &mut self,
        id: impl Into<String>,
        reason: Option<impl Into<String>>,
        payload: Option<JsonValue>,
    ) -> Result<()> {
        self.interrupt_with(InterruptInfo::new().with_id(id), reason, payload)
            .await
    }

    async fn interrupt_with(
        &mut self,
        mut info: InterruptInfo,
        reason: Option<impl Into<String>>,
        payload: Option<JsonValue>,
    ) -> Result<()> {
        let Some(run_id) = self.end_run() else {
            return Ok(());
        };
        if let Some(reason) = reason {
            info = info.with_reason(reason);
        }
        if let Some(payload) = payload {
            info = info.with_payload(payload);
        }
        let event = RunFinishedEvent::new(self.thread_id.clone(), run_id).with_interrupt(info);
        self.sink.emit(event.into()).await
    }

    /// Emits `STEP_STARTED` and remembers the step as open.
    pub async fn start_step(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.sink.emit(StepStartedEvent::new(name.clone()).into()).await?;
        self.open_steps.push(name);
        Ok(())
    }

    /// Emits `STEP_FINISHED` for the innermost open step.
    ///
    /// Returns the step name, or `None` when no step is open.
    pub async fn finish_step(&mut self) -> Result<Option<String>> {
        let Some(name) = self.open_steps.pop() else {
            return Ok(None);
        };
        self.sink
            .emit(StepFinishedEvent::new(name.clone()).into())
            .await?;
        Ok(Some(name))
    }

    pub async fn start_thinking(
        &self,
        title: Option<impl Into<String>>,
    ) -> Result<ThinkingStep<'_, S>> {
        ThinkingStep::start(&self.sink, title).await
    }

    /// Publishes `initial` as a snapshot and returns the stream for deltas.
    pub async fn start_state(&self, initial: JsonValue) -> Result<StateStream<'_, S>> {
        StateStream::start(&self.sink, initial).await
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    pub fn run_id(&self) -> Option<&RunId> {
        self.current_run.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.current_run.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.sink.is_connected()
    }

    fn end_run(&mut self) -> Option<RunId> {
        self.open_steps.clear();
        self.current_run.take()
    }
}
