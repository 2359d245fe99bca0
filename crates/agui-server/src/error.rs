//! Error types for the async drivers and transports.

use agui_core::ProtocolError;
use thiserror::Error;

/// Errors that can occur while driving or transporting a run.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The event stream broke a protocol rule.
    #[error("Protocol error: {0}")]
    Core(#[from] ProtocolError),

    /// The consumer behind a sink went away.
    #[error("Channel error: {0}")]
    Channel(String),
}

impl ServerError {
    /// The protocol error behind this failure, if any.
    pub fn protocol(&self) -> Option<&ProtocolError> {
        match self {
            ServerError::Core(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias using ServerError
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use agui_core::error::MissingBaseStateError;

    #[test]
    fn test_protocol_error_converts() {
        let err: ServerError = ProtocolError::from(MissingBaseStateError).into();
        assert_eq!(err.protocol().map(|e| e.code()), Some("MISSING_BASE_STATE"));
        assert!(err.to_string().starts_with("Protocol error:"));
        assert!(ServerError::Channel("closed".into()).protocol().is_none());
    }
}
