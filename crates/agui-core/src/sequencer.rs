//! Stream validation for one run.
//!
//! [`Sequencer`] feeds every event through field validation, the run state
//! machine and the state synchronizer, in that order, and forwards only the
//! events that pass all three. It never invents a terminal event on its own
//! initiative except in two places:
//! - [`Sequencer::finish`] when the source ends while the run is active;
//! - a rejection under [`ViolationPolicy::Terminate`].
//!
//! # Example
//!
//! ```rust
//! use agui_core::sequencer::Sequencer;
//! use agui_core::{RunStartedEvent, TextMessageChunkEvent};
//!
//! let mut sequencer = Sequencer::new();
//! sequencer.push(RunStartedEvent::new("t1", "r1").into()).unwrap();
//! sequencer
//!     .push(TextMessageChunkEvent::new().with_message_id("m1").with_delta("Hi").into())
//!     .unwrap();
//!
//! // the source ended without RUN_FINISHED
//! let terminal = sequencer.finish().unwrap();
//! assert_eq!(terminal.event_type().as_str(), "RUN_ERROR");
//! assert!(sequencer.finish().is_none());
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::JsonValue;
use crate::error::{ProtocolError, StreamTerminatedEarlyError, UnclosedStepError};
use crate::event::{Event, EventType, RunErrorEvent};
use crate::machine::{ChunkTarget, RunContext, RunPhase, RunTranscript, Transition};
use crate::state::StateSynchronizer;
use crate::types::RunId;

/// What happens to the run when an event is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationPolicy {
    /// Synthesize `RUN_ERROR` and end the run.
    #[default]
    Terminate,
    /// Drop the event, report it, keep the run going.
    Reject,
}

impl ViolationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationPolicy::Terminate => "terminate",
            ViolationPolicy::Reject => "reject",
        }
    }
}

impl std::fmt::Display for ViolationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "terminate" => Ok(ViolationPolicy::Terminate),
            "reject" => Ok(ViolationPolicy::Reject),
            other => Err(format!("unknown violation policy `{other}` (expected terminate or reject)")),
        }
    }
}

/// Non-fatal observations attached to an accepted event.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A chunk-opened entity was closed implicitly.
    AutoClosed(ChunkTarget),
    /// The run terminated with step frames still open.
    UnclosedSteps(UnclosedStepError),
    /// The event's timestamp is earlier than the previous one.
    TimestampRegressed { previous: u64, current: u64 },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::AutoClosed(target) => write!(f, "{target} auto-closed"),
            Diagnostic::UnclosedSteps(err) => write!(f, "{err}"),
            Diagnostic::TimestampRegressed { previous, current } => {
                write!(f, "timestamp went backwards ({current} < {previous})")
            }
        }
    }
}

/// An event that passed validation, ready to forward downstream.
#[derive(Debug, Clone)]
pub struct Accepted {
    pub event: Event,
    pub diagnostics: Vec<Diagnostic>,
}

/// An event that failed validation.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Rejection {
    #[source]
    pub error: ProtocolError,
    /// `RUN_ERROR` synthesized under [`ViolationPolicy::Terminate`]; forward it.
    pub terminal: Option<Event>,
}

/// One rejected event, as recorded in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Position of the event in the input, zero based.
    pub index: usize,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    pub message: String,
}

/// Summary of a validated stream.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub policy: ViolationPolicy,
    pub phase: RunPhase,
    pub accepted: usize,
    pub violations: Vec<Violation>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<RunTranscript>,
}

impl RunReport {
    /// No violations and the run finished successfully.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
            && self
                .transcript
                .as_ref()
                .is_some_and(RunTranscript::is_success)
    }
}

/// Validator and sequencer for one run.
#[derive(Debug, Default)]
pub struct Sequencer {
    policy: ViolationPolicy,
    context: RunContext,
    sync: StateSynchronizer,
    run_id: Option<RunId>,
    last_timestamp: Option<u64>,
    seen: usize,
    accepted: usize,
    violations: Vec<Violation>,
    warnings: Vec<String>,
    transcript: Option<RunTranscript>,
}

impl Sequencer {
    /// Creates a sequencer with [`ViolationPolicy::Terminate`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ViolationPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> ViolationPolicy {
        self.policy
    }

    pub fn phase(&self) -> RunPhase {
        self.context.phase()
    }

    pub fn run_id(&self) -> Option<&RunId> {
        self.run_id.as_ref()
    }

    /// The live run context. Empty once the run terminated.
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Current application state, from the live run or its transcript.
    pub fn state(&self) -> Option<&JsonValue> {
        match &self.transcript {
            Some(transcript) => transcript.state.as_ref(),
            None => self.sync.state(),
        }
    }

    /// The transcript of the terminated run.
    pub fn transcript(&self) -> Option<&RunTranscript> {
        self.transcript.as_ref()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Validates one event.
    pub fn push(&mut self, event: Event) -> Result<Accepted, Rejection> {
        let index = self.next_index();

        if let Err(err) = event.validate() {
            return Err(self.reject(index, Some(event.event_type()), err.into()));
        }

        let transition = match self.context.apply(&event) {
            Ok(transition) => transition,
            Err(err) => return Err(self.reject(index, Some(event.event_type()), err)),
        };

        if let Err(err) = self.sync.apply(&event) {
            return Err(self.reject(index, Some(event.event_type()), err));
        }

        let mut diagnostics = self.observe_timestamp(&event);
        if let Event::RunStarted(started) = &event {
            self.run_id = Some(started.run_id.clone());
        }
        diagnostics.extend(self.absorb(transition));

        self.accepted += 1;
        debug!(index, event_type = %event.event_type(), "event accepted");
        Ok(Accepted { event, diagnostics })
    }

    /// Decodes and validates one event from a JSON value.
    pub fn push_value(&mut self, value: JsonValue) -> Result<Accepted, Rejection> {
        match Event::from_value(value) {
            Ok(event) => self.push(event),
            Err(err) => {
                let index = self.next_index();
                let event_type = err.event_type;
                Err(self.reject(index, event_type, err.into()))
            }
        }
    }

    /// Decodes and validates one event from JSON text.
    pub fn push_json(&mut self, text: &str) -> Result<Accepted, Rejection> {
        match serde_json::from_str::<JsonValue>(text) {
            Ok(value) => self.push_value(value),
            Err(err) => {
                let index = self.next_index();
                let err = crate::error::MalformedEventError::invalid(None, "event", err.to_string());
                Err(self.reject(index, None, err.into()))
            }
        }
    }

    /// Applies the termination contract when the source ends.
    ///
    /// Returns the synthesized `RUN_ERROR` if the run was still active, and
    /// `None` otherwise (including on every later call).
    pub fn finish(&mut self) -> Option<Event> {
        if self.context.phase() != RunPhase::Active {
            return None;
        }
        let error: ProtocolError = StreamTerminatedEarlyError {
            run_id: self.run_id.clone(),
        }
        .into();
        warn!(code = error.code(), "{error}");
        self.violations.push(Violation {
            index: self.seen,
            code: error.code(),
            event_type: None,
            message: error.to_string(),
        });
        self.synthesize_error(&error)
    }

    /// Snapshot of what has been validated so far.
    pub fn report(&self) -> RunReport {
        RunReport {
            policy: self.policy,
            phase: self.context.phase(),
            accepted: self.accepted,
            violations: self.violations.clone(),
            warnings: self.warnings.clone(),
            transcript: self.transcript.clone(),
        }
    }

    /// Consumes the sequencer, returning its report.
    pub fn into_report(self) -> RunReport {
        RunReport {
            policy: self.policy,
            phase: self.context.phase(),
            accepted: self.accepted,
            violations: self.violations,
            warnings: self.warnings,
            transcript: self.transcript,
        }
    }

    fn next_index(&mut self) -> usize {
        let index = self.seen;
        self.seen += 1;
        index
    }

    fn observe_timestamp(&mut self, event: &Event) -> Vec<Diagnostic> {
        let Some(current) = event.timestamp() else {
            return Vec::new();
        };
        let previous = self.last_timestamp.replace(current);
        match previous {
            Some(previous) if current < previous && self.context.phase() != RunPhase::Absent => {
                let diagnostic = Diagnostic::TimestampRegressed { previous, current };
                warn!(event_type = %event.event_type(), "{diagnostic}");
                self.warnings.push(diagnostic.to_string());
                vec![diagnostic]
            }
            _ => Vec::new(),
        }
    }

    fn absorb(&mut self, transition: Transition) -> Vec<Diagnostic> {
        let mut diagnostics: Vec<Diagnostic> = transition
            .auto_closed
            .into_iter()
            .map(Diagnostic::AutoClosed)
            .collect();
        if let Some(unclosed) = transition.unclosed_steps {
            self.warnings.push(unclosed.to_string());
            diagnostics.push(Diagnostic::UnclosedSteps(unclosed));
        }
        if let Some(mut transcript) = transition.transcript {
            let (state, messages) = std::mem::take(&mut self.sync).into_parts();
            transcript.state = state;
            transcript.messages_snapshot = messages;
            self.transcript = Some(transcript);
        }
        diagnostics
    }

    fn reject(
        &mut self,
        index: usize,
        event_type: Option<EventType>,
        error: ProtocolError,
    ) -> Rejection {
        warn!(
            index,
            code = error.code(),
            event_type = event_type.map_or("unknown", |t| t.as_str()),
            "event rejected: {error}"
        );
        self.violations.push(Violation {
            index,
            code: error.code(),
            event_type: event_type.or_else(|| error.event_type()),
            message: error.to_string(),
        });

        let terminal = match self.policy {
            ViolationPolicy::Terminate if self.context.phase() == RunPhase::Active => {
                self.synthesize_error(&error)
            }
            _ => None,
        };
        Rejection { error, terminal }
    }

    fn synthesize_error(&mut self, error: &ProtocolError) -> Option<Event> {
        let event: Event = RunErrorEvent::new(error.to_string())
            .with_code(error.code())
            .into();
        match self.context.apply(&event) {
            Ok(transition) => {
                let _ = self.absorb(transition);
                Some(event)
            }
            Err(err) => {
                warn!("could not terminate run: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::*;
    use serde_json::json;

    fn started(policy: ViolationPolicy) -> Sequencer {
        let mut sequencer = Sequencer::with_policy(policy);
        sequencer
            .push(RunStartedEvent::new("t1", "r1").into())
            .unwrap();
        sequencer
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("Reject".parse::<ViolationPolicy>().unwrap(), ViolationPolicy::Reject);
        assert_eq!(ViolationPolicy::default(), ViolationPolicy::Terminate);
        assert!("lenient".parse::<ViolationPolicy>().is_err());
    }

    #[test]
    fn test_clean_run() {
        let mut sequencer = started(ViolationPolicy::Terminate);
        sequencer
            .push(StateSnapshotEvent::new(json!({"n": 0})).into())
            .unwrap();
        sequencer
            .push(StateDeltaEvent::new(vec![json!({"op": "replace", "path": "/n", "value": 1})]).into())
            .unwrap();
        sequencer
            .push(RunFinishedEvent::new("t1", "r1").into())
            .unwrap();

        assert!(sequencer.finish().is_none());
        let report = sequencer.into_report();
        assert!(report.is_clean());
        assert_eq!(report.accepted, 4);
        assert_eq!(report.transcript.unwrap().state, Some(json!({"n": 1})));
    }

    #[test]
    fn test_terminate_policy_synthesizes_run_error() {
        let mut sequencer = started(ViolationPolicy::Terminate);
        let rejection = sequencer
            .push(TextMessageContentEvent::new("m1", "x").into())
            .unwrap_err();

        assert!(matches!(rejection.error, ProtocolError::OutOfSequence(_)));
        match rejection.terminal {
            Some(Event::RunError(e)) => {
                assert_eq!(e.code.as_deref(), Some("OUT_OF_SEQUENCE_EVENT"))
            }
            other => panic!("expected synthesized RUN_ERROR, got {other:?}"),
        }
        assert_eq!(sequencer.phase(), RunPhase::Terminated);
        assert!(sequencer.finish().is_none());
        assert_eq!(sequencer.context().releases(), 1);
    }

    #[test]
    fn test_reject_policy_keeps_run_alive() {
        let mut sequencer = started(ViolationPolicy::Reject);
        let rejection = sequencer
            .push(StateDeltaEvent::new(vec![json!({"op": "add", "path": "/a", "value": 1})]).into())
            .unwrap_err();
        assert!(matches!(rejection.error, ProtocolError::MissingBaseState(_)));
        assert!(rejection.terminal.is_none());
        assert_eq!(sequencer.phase(), RunPhase::Active);

        sequencer
            .push(RunFinishedEvent::new("t1", "r1").into())
            .unwrap();
        let report = sequencer.report();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].code, "MISSING_BASE_STATE");
        assert_eq!(report.violations[0].index, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_malformed_event_never_reaches_state() {
        let mut sequencer = started(ViolationPolicy::Reject);
        sequencer
            .push(StateSnapshotEvent::new(json!({"n": 0})).into())
            .unwrap();
        let rejection = sequencer
            .push(StateDeltaEvent::new(vec![json!({"op": "replace", "value": 1})]).into())
            .unwrap_err();
        assert!(matches!(rejection.error, ProtocolError::Malformed(_)));
        assert_eq!(sequencer.state(), Some(&json!({"n": 0})));
    }

    #[test]
    fn test_finish_synthesizes_once() {
        let mut sequencer = started(ViolationPolicy::Terminate);
        let terminal = sequencer.finish().unwrap();
        match &terminal {
            Event::RunError(e) => assert_eq!(e.code.as_deref(), Some("STREAM_TERMINATED_EARLY")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(sequencer.finish().is_none());
        assert_eq!(sequencer.context().releases(), 1);
        assert_eq!(sequencer.violations()[0].code, "STREAM_TERMINATED_EARLY");
    }

    #[test]
    fn test_finish_closes_chunk_opened_message() {
        let mut sequencer = started(ViolationPolicy::Terminate);
        sequencer
            .push(TextMessageChunkEvent::new().with_message_id("m1").with_delta("Hi").into())
            .unwrap();

        assert!(sequencer.finish().is_some());
        let message = sequencer.transcript().unwrap().message("m1").unwrap();
        assert_eq!(message.status, crate::machine::EntityStatus::Closed);
        assert_eq!(message.content, "Hi");
    }

    #[test]
    fn test_finish_before_any_run_is_silent() {
        let mut sequencer = Sequencer::new();
        assert!(sequencer.finish().is_none());
        assert!(sequencer.violations().is_empty());
    }

    #[test]
    fn test_diagnostics() {
        let mut sequencer = started(ViolationPolicy::Terminate);
        sequencer
            .push(StepStartedEvent::new("plan").with_timestamp(10).into())
            .unwrap();
        let accepted = sequencer
            .push(
                TextMessageChunkEvent::new()
                    .with_message_id("m1")
                    .with_timestamp(5)
                    .into(),
            )
            .unwrap();
        assert_eq!(
            accepted.diagnostics,
            vec![Diagnostic::TimestampRegressed {
                previous: 10,
                current: 5
            }]
        );

        let accepted = sequencer
            .push(RunFinishedEvent::new("t1", "r1").into())
            .unwrap();
        assert!(accepted
            .diagnostics
            .contains(&Diagnostic::AutoClosed(ChunkTarget::Message("m1".into()))));
        assert!(accepted
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::UnclosedSteps(_))));
        assert_eq!(sequencer.report().warnings.len(), 2);
    }

    #[test]
    fn test_push_json_reports_decode_errors() {
        let mut sequencer = Sequencer::with_policy(ViolationPolicy::Reject);
        let rejection = sequencer.push_json("{not json").unwrap_err();
        assert!(matches!(rejection.error, ProtocolError::Malformed(_)));
        let rejection = sequencer
            .push_json(r#"{"type":"TEXT_MESSAGE_START"}"#)
            .unwrap_err();
        assert_eq!(rejection.error.event_type(), Some(EventType::TextMessageStart));
        assert_eq!(sequencer.violations()[1].index, 1);
    }
}
