use serde::{Deserialize, Serialize};

use crate::error::{PilotError, Result};
use crate::tool::{ToolCall, ToolOutcome, ToolResult};

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Human {
        text: String,
    },
    /// Text may be empty when the turn only proposes tool calls.
    Assistant {
        text: String,
        tool_calls: Vec<ToolCall>,
    },
    ToolResult(ToolResult),
    /// Directive for the reasoning capability. Sent per request, never stored.
    System {
        text: String,
    },
}

/// Who produced a message, as named in persisted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "human")]
    Human,
    #[serde(rename = "ai")]
    Assistant,
    #[serde(rename = "tool")]
    Tool,
    #[serde(rename = "system")]
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Human => "human",
            Role::Assistant => "ai",
            Role::Tool => "tool",
            Role::System => "system",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "human" => Ok(Role::Human),
            "ai" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            "system" => Ok(Role::System),
            other => Err(PilotError::Integrity(format!("unknown message role '{other}'"))),
        }
    }
}

/// Flat record form used by the history store and the HTTP transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedMessage {
    /// Accepts the legacy `type` field name on input.
    #[serde(alias = "type")]
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl PersistedMessage {
    fn plain(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            tool_calls: vec![],
            tool_call_id: None,
            tool_name: None,
            is_error: false,
        }
    }

    fn has_tool_metadata(&self) -> bool {
        !self.tool_calls.is_empty()
            || self.tool_call_id.is_some()
            || self.tool_name.is_some()
            || self.is_error
    }
}

impl Message {
    pub fn human(text: impl Into<String>) -> Self {
        Message::Human { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Message::Assistant {
            text: text.into(),
            tool_calls: vec![],
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Message::System { text: text.into() }
    }

    pub fn role(&self) -> Role {
        match self {
            Message::Human { .. } => Role::Human,
            Message::Assistant { .. } => Role::Assistant,
            Message::ToolResult(_) => Role::Tool,
            Message::System { .. } => Role::System,
        }
    }

    /// Text body, for roles that carry one.
    pub fn text(&self) -> Option<&str> {
        match self {
            Message::Human { text } | Message::Assistant { text, .. } | Message::System { text } => {
                Some(text.as_str())
            }
            Message::ToolResult(_) => None,
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Convert into the persisted record form.
    pub fn to_record(&self) -> PersistedMessage {
        match self {
            Message::Human { text } => PersistedMessage::plain(Role::Human, text),
            Message::System { text } => PersistedMessage::plain(Role::System, text),
            Message::Assistant { text, tool_calls } => PersistedMessage {
                tool_calls: tool_calls.clone(),
                ..PersistedMessage::plain(Role::Assistant, text)
            },
            Message::ToolResult(result) => {
                let (content, is_error) = match &result.outcome {
                    ToolOutcome::Payload(value) => (value.to_string(), false),
                    ToolOutcome::Error(detail) => (detail.clone(), true),
                };
                PersistedMessage {
                    role: Role::Tool,
                    content,
                    tool_calls: vec![],
                    tool_call_id: Some(result.tool_call_id.clone()),
                    tool_name: Some(result.tool_name.clone()),
                    is_error,
                }
            }
        }
    }

    /// Rebuild a message from its persisted record.
    pub fn from_record(record: &PersistedMessage) -> Result<Self> {
        match record.role {
            Role::Human | Role::System => {
                if record.has_tool_metadata() {
                    return Err(PilotError::Integrity(format!(
                        "{} record carries tool metadata",
                        record.role.as_str()
                    )));
                }
                Ok(if record.role == Role::Human {
                    Message::human(record.content.clone())
                } else {
                    Message::system(record.content.clone())
                })
            }
            Role::Assistant => {
                if record.tool_call_id.is_some() || record.tool_name.is_some() || record.is_error {
                    return Err(PilotError::Integrity(
                        "ai record carries tool-result metadata".into(),
                    ));
                }
                Ok(Message::Assistant {
                    text: record.content.clone(),
                    tool_calls: record.tool_calls.clone(),
                })
            }
            Role::Tool => {
                let (Some(tool_call_id), Some(tool_name)) = (&record.tool_call_id, &record.tool_name)
                else {
                    return Err(PilotError::Integrity(
                        "tool record is missing tool_call_id or tool_name".into(),
                    ));
                };
                if !record.tool_calls.is_empty() {
                    return Err(PilotError::Integrity("tool record carries tool calls".into()));
                }
                let outcome = if record.is_error {
                    ToolOutcome::Error(record.content.clone())
                } else {
                    let value = serde_json::from_str(&record.content).map_err(|e| {
                        PilotError::Integrity(format!("tool payload for {tool_call_id} is not JSON: {e}"))
                    })?;
                    ToolOutcome::Payload(value)
                };
                Ok(Message::ToolResult(ToolResult {
                    tool_call_id: tool_call_id.clone(),
                    tool_name: tool_name.clone(),
                    outcome,
                }))
            }
        }
    }
}
