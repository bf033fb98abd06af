//! # pilot-core
//!
//! Core types for the DevPilot assistant: messages, conversation memory,
//! tool descriptions, identity and the shared error type. Every other crate
//! in the workspace speaks this vocabulary.

pub mod conversation;
pub mod error;
pub mod message;
pub mod tool;
pub mod types;

pub use conversation::Conversation;
pub use error::{PilotError, Result};
pub use message::{Message, PersistedMessage, Role};
pub use tool::{ParamKind, ParamSpec, ToolCall, ToolDefinition, ToolOutcome, ToolResult};
pub use types::*;
