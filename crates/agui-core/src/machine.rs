//! Run, message, tool-call, thinking and step lifecycles.
//!
//! A [`RunContext`] owns everything one run creates. It accepts events one at
//! a time and either transitions or rejects them; a rejected event leaves the
//! context exactly as it was. When the run terminates the live tables are
//! released and handed back as an immutable [`RunTranscript`].

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::JsonValue;
use crate::error::{MalformedEventError, OutOfSequenceEventError, ProtocolError, Result, UnclosedStepError};
use crate::event::{
    Event, EventType, RunFinishedEvent, RunFinishedOutcome, TextMessageChunkEvent,
    ToolCallChunkEvent,
};
use crate::types::{FunctionCall, Message, MessageId, Role, RunId, ThreadId, ToolCall, ToolCallId};

/// Lifecycle phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    /// No `RUN_STARTED` yet.
    Absent,
    /// Between `RUN_STARTED` and the terminal event.
    Active,
    /// After `RUN_FINISHED` or `RUN_ERROR`.
    Terminated,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RunPhase::Absent => "absent",
            RunPhase::Active => "active",
            RunPhase::Terminated => "terminated",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Open,
    Closed,
}

/// How an entity came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenedBy {
    /// `*_START`.
    Explicit,
    /// First `*_CHUNK` for an unseen ID.
    Chunk,
    /// Installed by `MESSAGES_SNAPSHOT`.
    Snapshot,
}

/// The entity a chunk event opened and that the next chunk may continue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum ChunkTarget {
    Message(MessageId),
    ToolCall(ToolCallId),
}

impl std::fmt::Display for ChunkTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkTarget::Message(id) => write!(f, "message {id}"),
            ChunkTarget::ToolCall(id) => write!(f, "tool call {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub status: EntityStatus,
    pub opened_by: OpenedBy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    pub id: ToolCallId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<MessageId>,
    pub arguments: String,
    pub status: EntityStatus,
    pub opened_by: OpenedBy,
}

/// One `THINKING_START` … `THINKING_END` segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Text of each thinking text message, in order.
    pub messages: Vec<String>,
    pub status: EntityStatus,
    #[serde(skip)]
    text_open: bool,
}

/// How the run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RunOutcome {
    Finished {
        outcome: RunFinishedOutcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<JsonValue>,
    },
    Errored {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

/// Everything a terminated run produced.
///
/// Entities abandoned by `RUN_ERROR` keep their `Open` status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTranscript {
    pub thread_id: ThreadId,
    pub run_id: RunId,
    pub outcome: RunOutcome,
    pub messages: Vec<MessageRecord>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub thinking: Vec<ThinkingRecord>,
    /// Step frames still open at termination, outermost first.
    pub open_steps: Vec<String>,
    /// Final application state, when a snapshot established one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<JsonValue>,
    /// Last `MESSAGES_SNAPSHOT` history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages_snapshot: Option<Vec<Message>>,
}

impl RunTranscript {
    pub fn message(&self, id: &str) -> Option<&MessageRecord> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn tool_call(&self, id: &str) -> Option<&ToolCallRecord> {
        self.tool_calls.iter().find(|t| t.id == id)
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Finished { .. })
    }

    /// Closed messages as conversation history, with closed tool calls
    /// attached to their parent assistant message.
    pub fn history(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| m.status == EntityStatus::Closed)
            .map(|record| {
                let message = Message::new(record.role, record.id.clone(), record.content.clone());
                let calls: Vec<ToolCall> = self
                    .tool_calls
                    .iter()
                    .filter(|t| {
                        t.status == EntityStatus::Closed
                            && t.parent_message_id.as_ref() == Some(&record.id)
                    })
                    .map(|t| {
                        ToolCall::new(
                            t.id.clone(),
                            FunctionCall {
                                name: t.name.clone(),
                                arguments: t.arguments.clone(),
                            },
                        )
                    })
                    .collect();
                if calls.is_empty() {
                    message
                } else {
                    message.with_tool_calls(calls)
                }
            })
            .collect()
    }
}

/// What accepting one event did.
#[derive(Debug, Default)]
pub struct Transition {
    /// Chunk-opened entities closed implicitly by this event.
    pub auto_closed: Vec<ChunkTarget>,
    /// Set when the run terminated with step frames still open.
    pub unclosed_steps: Option<UnclosedStepError>,
    /// Set when this event terminated the run.
    pub transcript: Option<RunTranscript>,
}

impl Transition {
    pub fn is_terminal(&self) -> bool {
        self.transcript.is_some()
    }
}

/// Per-run lifecycle state.
#[derive(Debug)]
pub struct RunContext {
    phase: RunPhase,
    live: Option<LiveRun>,
    releases: u32,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            phase: RunPhase::Absent,
            live: None,
            releases: 0,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn run_id(&self) -> Option<&RunId> {
        self.live.as_ref().map(|live| &live.run_id)
    }

    pub fn thread_id(&self) -> Option<&ThreadId> {
        self.live.as_ref().map(|live| &live.thread_id)
    }

    /// Open step frames, outermost first.
    pub fn open_steps(&self) -> &[String] {
        self.live.as_ref().map_or(&[][..], |live| live.steps.as_slice())
    }

    pub fn message(&self, id: &str) -> Option<&MessageRecord> {
        let live = self.live.as_ref()?;
        live.message_index.get(id).map(|&i| &live.messages[i])
    }

    pub fn tool_call(&self, id: &str) -> Option<&ToolCallRecord> {
        let live = self.live.as_ref()?;
        live.tool_call_index.get(id).map(|&i| &live.tool_calls[i])
    }

    /// The entity the last chunk opened, if it is still open.
    pub fn chunk_active(&self) -> Option<&ChunkTarget> {
        self.live.as_ref()?.chunk_active.as_ref()
    }

    /// How many times live run state has been released. Never exceeds one.
    pub fn releases(&self) -> u32 {
        self.releases
    }

    /// Accepts or rejects one event.
    pub fn apply(&mut self, event: &Event) -> Result<Transition> {
        if event.event_type().is_escape_hatch() {
            return Ok(Transition::default());
        }
        match self.phase {
            RunPhase::Absent => match event {
                Event::RunStarted(e) => {
                    info!(thread_id = %e.thread_id, run_id = %e.run_id, "run started");
                    self.live = Some(LiveRun::new(e.thread_id.clone(), e.run_id.clone()));
                    self.phase = RunPhase::Active;
                    Ok(Transition::default())
                }
                _ => Err(out_of_sequence(event, self.phase, "no run has started")),
            },
            RunPhase::Terminated => Err(out_of_sequence(
                event,
                self.phase,
                "the run has already terminated",
            )),
            RunPhase::Active => self.apply_active(event),
        }
    }

    fn apply_active(&mut self, event: &Event) -> Result<Transition> {
        let Some(live) = self.live.as_mut() else {
            return Err(out_of_sequence(event, self.phase, "run state was released"));
        };

        let auto_closed = match event {
            Event::RunStarted(_) => {
                return Err(out_of_sequence(event, RunPhase::Active, "a run is already active"));
            }
            Event::RunFinished(e) => {
                live.check_finish(event, e)?;
                let auto_closed = live.close_chunk();
                let outcome = RunOutcome::Finished {
                    outcome: e.effective_outcome(),
                    result: e.result.clone(),
                };
                return Ok(self.terminate(outcome, auto_closed));
            }
            Event::RunError(e) => {
                // explicitly opened entities stay open; chunk-opened ones close
                let auto_closed = live.close_chunk();
                let outcome = RunOutcome::Errored {
                    message: e.message.clone(),
                    code: e.code.clone(),
                };
                return Ok(self.terminate(outcome, auto_closed));
            }
            Event::TextMessageStart(e) => {
                live.check_no_thinking(event)?;
                live.check_unused_message(event, &e.message_id)?;
                live.open_message(e.message_id.clone(), e.role, String::new(), OpenedBy::Explicit);
                Vec::new()
            }
            Event::TextMessageContent(e) => {
                let index = live.open_message_index(event, &e.message_id)?;
                live.messages[index].content.push_str(&e.delta);
                Vec::new()
            }
            Event::TextMessageEnd(e) => {
                let index = live.open_message_index(event, &e.message_id)?;
                live.messages[index].status = EntityStatus::Closed;
                if live.chunk_active == Some(ChunkTarget::Message(e.message_id.clone())) {
                    live.chunk_active = None;
                }
                debug!(message_id = %e.message_id, "message closed");
                Vec::new()
            }
            Event::TextMessageChunk(e) => live.text_chunk(event, e)?,
            Event::ToolCallStart(e) => {
                live.check_unused_tool_call(event, &e.tool_call_id)?;
                live.open_tool_call(
                    e.tool_call_id.clone(),
                    e.tool_call_name.clone(),
                    e.parent_message_id.clone(),
                    String::new(),
                    OpenedBy::Explicit,
                );
                Vec::new()
            }
            Event::ToolCallArgs(e) => {
                let index = live.open_tool_call_index(event, &e.tool_call_id)?;
                live.tool_calls[index].arguments.push_str(&e.delta);
                Vec::new()
            }
            Event::ToolCallEnd(e) => {
                let index = live.open_tool_call_index(event, &e.tool_call_id)?;
                live.tool_calls[index].status = EntityStatus::Closed;
                if live.chunk_active == Some(ChunkTarget::ToolCall(e.tool_call_id.clone())) {
                    live.chunk_active = None;
                }
                debug!(tool_call_id = %e.tool_call_id, "tool call closed");
                Vec::new()
            }
            Event::ToolCallChunk(e) => live.tool_chunk(event, e)?,
            Event::ThinkingStart(e) => {
                live.check_no_thinking(event)?;
                if let Some(message) = live.messages.iter().find(|m| m.status == EntityStatus::Open) {
                    return Err(out_of_sequence(
                        event,
                        RunPhase::Active,
                        format!("text message `{}` is open", message.id),
                    ));
                }
                live.thinking.push(ThinkingRecord {
                    title: e.title.clone(),
                    messages: Vec::new(),
                    status: EntityStatus::Open,
                    text_open: false,
                });
                debug!("thinking segment opened");
                Vec::new()
            }
            Event::ThinkingTextMessageStart(_) => {
                let segment = live.open_thinking(event)?;
                if segment.text_open {
                    return Err(out_of_sequence(
                        event,
                        RunPhase::Active,
                        "a thinking text message is already open",
                    ));
                }
                segment.text_open = true;
                segment.messages.push(String::new());
                Vec::new()
            }
            Event::ThinkingTextMessageContent(e) => {
                let segment = live.open_thinking_text(event)?;
                if let Some(text) = segment.messages.last_mut() {
                    text.push_str(&e.delta);
                }
                Vec::new()
            }
            Event::ThinkingTextMessageEnd(_) => {
                let segment = live.open_thinking_text(event)?;
                segment.text_open = false;
                Vec::new()
            }
            Event::ThinkingEnd(_) => {
                let segment = live.open_thinking(event)?;
                if segment.text_open {
                    return Err(out_of_sequence(
                        event,
                        RunPhase::Active,
                        "the thinking text message is still open",
                    ));
                }
                segment.status = EntityStatus::Closed;
                debug!("thinking segment closed");
                Vec::new()
            }
            Event::StateSnapshot(_) | Event::StateDelta(_) => Vec::new(),
            Event::MessagesSnapshot(e) => {
                live.replace_messages(&e.messages);
                Vec::new()
            }
            Event::StepStarted(e) => {
                live.steps.push(e.step_name.clone());
                debug!(step = %e.step_name, depth = live.steps.len(), "step started");
                Vec::new()
            }
            Event::StepFinished(e) => {
                match live.steps.last() {
                    None => {
                        return Err(out_of_sequence(event, RunPhase::Active, "no step is open"));
                    }
                    Some(top) if *top != e.step_name => {
                        return Err(out_of_sequence(
                            event,
                            RunPhase::Active,
                            format!("`{top}` is the innermost open step"),
                        ));
                    }
                    Some(_) => {}
                }
                live.steps.pop();
                debug!(step = %e.step_name, "step finished");
                Vec::new()
            }
            Event::Raw(_) | Event::Custom(_) => Vec::new(),
        };

        Ok(Transition {
            auto_closed,
            ..Transition::default()
        })
    }

    fn terminate(&mut self, outcome: RunOutcome, auto_closed: Vec<ChunkTarget>) -> Transition {
        self.phase = RunPhase::Terminated;
        let Some(live) = self.live.take() else {
            return Transition {
                auto_closed,
                ..Transition::default()
            };
        };
        self.releases += 1;

        let unclosed_steps = if live.steps.is_empty() {
            None
        } else {
            let err = UnclosedStepError {
                steps: live.steps.clone(),
            };
            warn!(run_id = %live.run_id, "{err}");
            Some(err)
        };

        match &outcome {
            RunOutcome::Finished { outcome, .. } => {
                info!(run_id = %live.run_id, ?outcome, "run finished")
            }
            RunOutcome::Errored { message, code } => {
                info!(run_id = %live.run_id, code = ?code, "run errored: {message}")
            }
        }

        Transition {
            auto_closed,
            unclosed_steps,
            transcript: Some(RunTranscript {
                thread_id: live.thread_id,
                run_id: live.run_id,
                outcome,
                messages: live.messages,
                tool_calls: live.tool_calls,
                thinking: live.thinking,
                open_steps: live.steps,
                state: None,
                messages_snapshot: None,
            }),
        }
    }
}

fn out_of_sequence(event: &Event, phase: RunPhase, reason: impl Into<String>) -> ProtocolError {
    OutOfSequenceEventError {
        event_type: event.event_type(),
        id: event.subject_id().map(str::to_string),
        phase,
        reason: reason.into(),
    }
    .into()
}

#[derive(Debug)]
struct LiveRun {
    thread_id: ThreadId,
    run_id: RunId,
    messages: Vec<MessageRecord>,
    message_index: HashMap<MessageId, usize>,
    tool_calls: Vec<ToolCallRecord>,
    tool_call_index: HashMap<ToolCallId, usize>,
    thinking: Vec<ThinkingRecord>,
    steps: Vec<String>,
    chunk_active: Option<ChunkTarget>,
}

impl LiveRun {
    fn new(thread_id: ThreadId, run_id: RunId) -> Self {
        Self {
            thread_id,
            run_id,
            messages: Vec::new(),
            message_index: HashMap::new(),
            tool_calls: Vec::new(),
            tool_call_index: HashMap::new(),
            thinking: Vec::new(),
            steps: Vec::new(),
            chunk_active: None,
        }
    }

    fn thinking_open(&self) -> bool {
        self.thinking
            .last()
            .is_some_and(|segment| segment.status == EntityStatus::Open)
    }

    fn check_no_thinking(&self, event: &Event) -> Result<()> {
        if self.thinking_open() {
            Err(out_of_sequence(event, RunPhase::Active, "a thinking segment is open"))
        } else {
            Ok(())
        }
    }

    fn check_unused_message(&self, event: &Event, id: &MessageId) -> Result<()> {
        if self.message_index.contains_key(id) {
            Err(out_of_sequence(
                event,
                RunPhase::Active,
                format!("message id `{id}` was already used in this run"),
            ))
        } else {
            Ok(())
        }
    }

    fn check_unused_tool_call(&self, event: &Event, id: &ToolCallId) -> Result<()> {
        if self.tool_call_index.contains_key(id) {
            Err(out_of_sequence(
                event,
                RunPhase::Active,
                format!("tool call id `{id}` was already used in this run"),
            ))
        } else {
            Ok(())
        }
    }

    fn open_message_index(&self, event: &Event, id: &MessageId) -> Result<usize> {
        match self.message_index.get(id) {
            Some(&index) if self.messages[index].status == EntityStatus::Open => Ok(index),
            Some(_) => Err(out_of_sequence(
                event,
                RunPhase::Active,
                format!("message `{id}` is already closed"),
            )),
            None => Err(out_of_sequence(
                event,
                RunPhase::Active,
                format!("message `{id}` was never opened"),
            )),
        }
    }

    fn open_tool_call_index(&self, event: &Event, id: &ToolCallId) -> Result<usize> {
        match self.tool_call_index.get(id) {
            Some(&index) if self.tool_calls[index].status == EntityStatus::Open => Ok(index),
            Some(_) => Err(out_of_sequence(
                event,
                RunPhase::Active,
                format!("tool call `{id}` is already closed"),
            )),
            None => Err(out_of_sequence(
                event,
                RunPhase::Active,
                format!("tool call `{id}` was never opened"),
            )),
        }
    }

    fn open_message(&mut self, id: MessageId, role: Role, content: String, opened_by: OpenedBy) {
        debug!(message_id = %id, %role, ?opened_by, "message opened");
        self.message_index.insert(id.clone(), self.messages.len());
        self.messages.push(MessageRecord {
            id,
            role,
            content,
            status: EntityStatus::Open,
            opened_by,
        });
    }

    fn open_tool_call(
        &mut self,
        id: ToolCallId,
        name: String,
        parent_message_id: Option<MessageId>,
        arguments: String,
        opened_by: OpenedBy,
    ) {
        debug!(tool_call_id = %id, tool = %name, ?opened_by, "tool call opened");
        self.tool_call_index.insert(id.clone(), self.tool_calls.len());
        self.tool_calls.push(ToolCallRecord {
            id,
            name,
            parent_message_id,
            arguments,
            status: EntityStatus::Open,
            opened_by,
        });
    }

    fn open_thinking(&mut self, event: &Event) -> Result<&mut ThinkingRecord> {
        match self.thinking.last_mut() {
            Some(segment) if segment.status == EntityStatus::Open => Ok(segment),
            _ => Err(out_of_sequence(event, RunPhase::Active, "no thinking segment is open")),
        }
    }

    fn open_thinking_text(&mut self, event: &Event) -> Result<&mut ThinkingRecord> {
        let segment = self.open_thinking(event)?;
        if segment.text_open {
            Ok(segment)
        } else {
            Err(out_of_sequence(
                event,
                RunPhase::Active,
                "no thinking text message is open",
            ))
        }
    }

    /// Closes the chunk-opened entity, if any.
    fn close_chunk(&mut self) -> Vec<ChunkTarget> {
        let Some(target) = self.chunk_active.take() else {
            return Vec::new();
        };
        match &target {
            ChunkTarget::Message(id) => {
                if let Some(&index) = self.message_index.get(id) {
                    self.messages[index].status = EntityStatus::Closed;
                }
            }
            ChunkTarget::ToolCall(id) => {
                if let Some(&index) = self.tool_call_index.get(id) {
                    self.tool_calls[index].status = EntityStatus::Closed;
                }
            }
        }
        debug!(target = %target, "chunk-opened entity auto-closed");
        vec![target]
    }

    fn text_chunk(&mut self, event: &Event, chunk: &TextMessageChunkEvent) -> Result<Vec<ChunkTarget>> {
        let id = match (&chunk.message_id, &self.chunk_active) {
            (Some(id), _) => id.clone(),
            (None, Some(ChunkTarget::Message(id))) => id.clone(),
            (None, _) => {
                return Err(out_of_sequence(
                    event,
                    RunPhase::Active,
                    "chunk has no messageId and no chunk-opened message to continue",
                ));
            }
        };
        let target = ChunkTarget::Message(id.clone());
        let delta = chunk.delta.as_deref().unwrap_or_default();

        match self.message_index.get(&id).copied() {
            Some(index) if self.messages[index].status == EntityStatus::Open => {
                let auto_closed = if self.chunk_active.as_ref() == Some(&target) {
                    Vec::new()
                } else {
                    self.close_chunk()
                };
                self.messages[index].content.push_str(delta);
                Ok(auto_closed)
            }
            Some(_) => Err(out_of_sequence(
                event,
                RunPhase::Active,
                format!("message `{id}` is already closed"),
            )),
            None => {
                self.check_no_thinking(event)?;
                let auto_closed = self.close_chunk();
                self.open_message(
                    id,
                    chunk.role.unwrap_or_default(),
                    delta.to_string(),
                    OpenedBy::Chunk,
                );
                self.chunk_active = Some(target);
                Ok(auto_closed)
            }
        }
    }

    fn tool_chunk(&mut self, event: &Event, chunk: &ToolCallChunkEvent) -> Result<Vec<ChunkTarget>> {
        let id = match (&chunk.tool_call_id, &self.chunk_active) {
            (Some(id), _) => id.clone(),
            (None, Some(ChunkTarget::ToolCall(id))) => id.clone(),
            (None, _) => {
                return Err(out_of_sequence(
                    event,
                    RunPhase::Active,
                    "chunk has no toolCallId and no chunk-opened tool call to continue",
                ));
            }
        };
        let target = ChunkTarget::ToolCall(id.clone());
        let delta = chunk.delta.as_deref().unwrap_or_default();

        match self.tool_call_index.get(&id).copied() {
            Some(index) if self.tool_calls[index].status == EntityStatus::Open => {
                let auto_closed = if self.chunk_active.as_ref() == Some(&target) {
                    Vec::new()
                } else {
                    self.close_chunk()
                };
                self.tool_calls[index].arguments.push_str(delta);
                Ok(auto_closed)
            }
            Some(_) => Err(out_of_sequence(
                event,
                RunPhase::Active,
                format!("tool call `{id}` is already closed"),
            )),
            None => {
                let Some(name) = chunk.tool_call_name.clone() else {
                    return Err(MalformedEventError::missing(
                        Some(EventType::ToolCallChunk),
                        "toolCallName",
                    )
                    .into());
                };
                let auto_closed = self.close_chunk();
                self.open_tool_call(
                    id,
                    name,
                    chunk.parent_message_id.clone(),
                    delta.to_string(),
                    OpenedBy::Chunk,
                );
                self.chunk_active = Some(target);
                Ok(auto_closed)
            }
        }
    }

    fn check_finish(&self, event: &Event, finished: &RunFinishedEvent) -> Result<()> {
        if finished.thread_id != self.thread_id || finished.run_id != self.run_id {
            return Err(out_of_sequence(
                event,
                RunPhase::Active,
                format!(
                    "active run is {}/{}, not {}/{}",
                    self.thread_id, self.run_id, finished.thread_id, finished.run_id
                ),
            ));
        }
        if let Some(message) = self
            .messages
            .iter()
            .find(|m| m.status == EntityStatus::Open && m.opened_by != OpenedBy::Chunk)
        {
            return Err(out_of_sequence(
                event,
                RunPhase::Active,
                format!("message `{}` is still open", message.id),
            ));
        }
        if let Some(call) = self
            .tool_calls
            .iter()
            .find(|t| t.status == EntityStatus::Open && t.opened_by != OpenedBy::Chunk)
        {
            return Err(out_of_sequence(
                event,
                RunPhase::Active,
                format!("tool call `{}` is still open", call.id),
            ));
        }
        if self.thinking_open() {
            return Err(out_of_sequence(
                event,
                RunPhase::Active,
                "a thinking segment is still open",
            ));
        }
        Ok(())
    }

    fn replace_messages(&mut self, history: &[Message]) {
        let discarded = self
            .messages
            .iter()
            .filter(|m| m.status == EntityStatus::Open)
            .count();
        if discarded > 0 {
            debug!(discarded, "open messages superseded by message snapshot");
        }
        if matches!(self.chunk_active, Some(ChunkTarget::Message(_))) {
            self.chunk_active = None;
        }

        self.messages = history
            .iter()
            .map(|message| MessageRecord {
                id: message.id().clone(),
                role: message.role(),
                content: message.content().unwrap_or_default().to_string(),
                status: EntityStatus::Closed,
                opened_by: OpenedBy::Snapshot,
            })
            .collect();
        self.message_index = self
            .messages
            .iter()
            .enumerate()
            .map(|(index, record)| (record.id.clone(), index))
            .collect();
    }
}
