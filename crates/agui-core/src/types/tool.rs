//! Tool call types for the AG-UI protocol.

use crate::types::ids::ToolCallId;
use crate::types::message::FunctionCall;
use serde::{Deserialize, Serialize};

/// A tool call made by an assistant, as recorded in the message history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call.
    pub id: ToolCallId,
    /// The type of call (always "function" for now).
    #[serde(rename = "type")]
    pub call_type: String,
    /// The function being called with its arguments.
    pub function: FunctionCall,
}

impl ToolCall {
    /// Creates a new tool call with the given ID and function.
    pub fn new(id: impl Into<ToolCallId>, function: FunctionCall) -> Self {
        Self {
            id: id.into(),
            call_type: "function".to_string(),
            function,
        }
    }
}
