//! Error types for the AG-UI protocol engine.
//!
//! Each rejection kind is its own struct carrying the detail a driving
//! context needs to log or reject upstream (event tag, offending field or
//! path, current run phase). [`ProtocolError`] unifies them.

use thiserror::Error;

use crate::JsonValue;
use crate::event::EventType;
use crate::machine::RunPhase;
use crate::types::RunId;

/// Why a field failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// The field is absent.
    Missing,
    /// The field is present but empty.
    Empty,
    /// The field is present but its value is unusable.
    Invalid(String),
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedReason::Missing => f.write_str("is missing"),
            MalformedReason::Empty => f.write_str("must not be empty"),
            MalformedReason::Invalid(detail) => write!(f, "is invalid: {detail}"),
        }
    }
}

/// An event is missing a required field or carries an invalid one.
///
/// Raised before the event reaches any state mutation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed {} event: `{field}` {reason}", .event_type.map_or("unknown", |t| t.as_str()))]
pub struct MalformedEventError {
    /// Tag of the event, when it could be determined.
    pub event_type: Option<EventType>,
    /// Wire name of the offending field (`messageId`, `delta[2]`, ...).
    pub field: String,
    /// What is wrong with it.
    pub reason: MalformedReason,
}

impl MalformedEventError {
    pub fn missing(event_type: Option<EventType>, field: impl Into<String>) -> Self {
        Self {
            event_type,
            field: field.into(),
            reason: MalformedReason::Missing,
        }
    }

    pub fn empty(event_type: EventType, field: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type),
            field: field.into(),
            reason: MalformedReason::Empty,
        }
    }

    pub fn invalid(
        event_type: Option<EventType>,
        field: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            field: field.into(),
            reason: MalformedReason::Invalid(detail.into()),
        }
    }
}

/// An event is illegal in the current run, message, tool-call or step state.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{event_type} rejected while run is {phase}: {reason}")]
pub struct OutOfSequenceEventError {
    /// Tag of the rejected event.
    pub event_type: EventType,
    /// Identifier the event referenced (message, tool call, step or run), if any.
    pub id: Option<String>,
    /// Run phase at the time of rejection.
    pub phase: RunPhase,
    /// Human readable explanation.
    pub reason: String,
}

/// A state delta arrived before any snapshot established a base.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("STATE_DELTA received before any STATE_SNAPSHOT established a base state")]
pub struct MissingBaseStateError;

/// A `test` operation inside a state delta did not match.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "test operation {operation} failed at `{path}`: expected {expected}, found {}",
    .actual.as_ref().map_or_else(|| "nothing".to_string(), |v| v.to_string())
)]
pub struct StateTestFailedError {
    /// Index of the failing operation inside the delta.
    pub operation: usize,
    /// JSON pointer the test addressed.
    pub path: String,
    /// Value the test expected.
    pub expected: JsonValue,
    /// Value actually found, `None` when the path did not resolve.
    pub actual: Option<JsonValue>,
}

/// A non-test operation inside a state delta could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("patch operation {operation} failed at `{path}`: {reason}")]
pub struct InvalidPatchError {
    /// Index of the failing operation inside the delta.
    pub operation: usize,
    /// JSON pointer the operation addressed.
    pub path: String,
    /// Failure reported by the patch engine.
    pub reason: String,
}

/// The run terminated with step frames still open. Reported, not fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("run terminated with {} unclosed step(s): {}", .steps.len(), .steps.join(", "))]
pub struct UnclosedStepError {
    /// Names of the open frames, outermost first.
    pub steps: Vec<String>,
}

/// The event source ended while the run was still active.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event stream ended before RUN_FINISHED or RUN_ERROR{}", .run_id.as_ref().map(|id| format!(" (run {id})")).unwrap_or_default())]
pub struct StreamTerminatedEarlyError {
    /// The run that was left open, if one had started.
    pub run_id: Option<RunId>,
}

/// Errors produced by the protocol engine.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Malformed(#[from] MalformedEventError),

    #[error(transparent)]
    OutOfSequence(#[from] OutOfSequenceEventError),

    #[error(transparent)]
    MissingBaseState(#[from] MissingBaseStateError),

    #[error(transparent)]
    StateTestFailed(#[from] StateTestFailedError),

    #[error(transparent)]
    InvalidPatch(#[from] InvalidPatchError),

    #[error(transparent)]
    UnclosedStep(#[from] UnclosedStepError),

    #[error(transparent)]
    StreamTerminatedEarly(#[from] StreamTerminatedEarlyError),

    /// Error during JSON serialization of an outgoing frame.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Stable code carried by synthesized `RUN_ERROR` events.
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::Malformed(_) => "MALFORMED_EVENT",
            ProtocolError::OutOfSequence(_) => "OUT_OF_SEQUENCE_EVENT",
            ProtocolError::MissingBaseState(_) => "MISSING_BASE_STATE",
            ProtocolError::StateTestFailed(_) => "STATE_TEST_FAILED",
            ProtocolError::InvalidPatch(_) => "INVALID_PATCH",
            ProtocolError::UnclosedStep(_) => "UNCLOSED_STEP",
            ProtocolError::StreamTerminatedEarly(_) => "STREAM_TERMINATED_EARLY",
            ProtocolError::Serialization(_) => "SERIALIZATION",
        }
    }

    /// Whether the error ends validation of the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ProtocolError::UnclosedStep(_))
    }

    /// Tag of the event the error refers to, when known.
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            ProtocolError::Malformed(e) => e.event_type,
            ProtocolError::OutOfSequence(e) => Some(e.event_type),
            ProtocolError::MissingBaseState(_)
            | ProtocolError::StateTestFailed(_)
            | ProtocolError::InvalidPatch(_) => Some(EventType::StateDelta),
            _ => None,
        }
    }
}

/// Result type alias using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_malformed_display_names_field() {
        let err = MalformedEventError::missing(Some(EventType::TextMessageContent), "messageId");
        assert_eq!(
            err.to_string(),
            "malformed TEXT_MESSAGE_CONTENT event: `messageId` is missing"
        );

        let err = MalformedEventError::missing(None, "type");
        assert_eq!(err.to_string(), "malformed unknown event: `type` is missing");
    }

    #[test]
    fn test_state_test_failed_display() {
        let err = StateTestFailedError {
            operation: 0,
            path: "/count".into(),
            expected: json!(1),
            actual: Some(json!(2)),
        };
        assert_eq!(
            err.to_string(),
            "test operation 0 failed at `/count`: expected 1, found 2"
        );

        let err = StateTestFailedError {
            actual: None,
            ..err
        };
        assert!(err.to_string().ends_with("found nothing"));
    }

    #[test]
    fn test_unclosed_step_display() {
        let err = UnclosedStepError {
            steps: vec!["plan".into(), "search".into()],
        };
        assert_eq!(
            err.to_string(),
            "run terminated with 2 unclosed step(s): plan, search"
        );
    }

    #[test]
    fn test_codes_and_fatality() {
        let err: ProtocolError = MissingBaseStateError.into();
        assert_eq!(err.code(), "MISSING_BASE_STATE");
        assert!(err.is_fatal());
        assert_eq!(err.event_type(), Some(EventType::StateDelta));

        let err: ProtocolError = UnclosedStepError { steps: vec![] }.into();
        assert_eq!(err.code(), "UNCLOSED_STEP");
        assert!(!err.is_fatal());

        let err: ProtocolError = StreamTerminatedEarlyError { run_id: None }.into();
        assert_eq!(err.code(), "STREAM_TERMINATED_EARLY");
    }

    #[test]
    fn test_error_is_std_error() {
        fn requires_error<E: std::error::Error>(_: E) {}
        requires_error(MissingBaseStateError);
        requires_error(ProtocolError::from(MissingBaseStateError));
    }
}
