//! AG-UI Protocol Types
//!
//! This module defines the value types carried inside events:
//! - ID types (ThreadId, RunId, MessageId, ToolCallId)
//! - Message history entries and roles
//! - Tool call records

mod ids;
mod message;
mod tool;

pub use ids::*;
pub use message::*;
pub use tool::*;
