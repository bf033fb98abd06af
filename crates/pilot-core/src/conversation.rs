//! Append-only conversation memory.
//!
//! A [`Conversation`] only ever grows. Appends are validated so that every
//! tool result answers exactly one earlier proposal; anything else is refused
//! with [`PilotError::Integrity`] instead of being stored.
//!
//! Tool-call ids are scoped to a run. A human message starts a new run, after
//! which ids that were already answered may be proposed again.

use std::collections::HashSet;

use crate::error::{PilotError, Result};
use crate::message::{Message, PersistedMessage};
use crate::tool::ToolCall;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
    /// Ids proposed in the current run, plus any still pending from earlier ones.
    proposed: HashSet<String>,
    /// Proposed calls without a result, in proposal order.
    pending: Vec<ToolCall>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a conversation from messages, validating each append.
    pub fn from_messages(messages: impl IntoIterator<Item = Message>) -> Result<Self> {
        let mut conversation = Self::new();
        for message in messages {
            conversation.push(message)?;
        }
        Ok(conversation)
    }

    /// Rebuild a conversation from stored records.
    pub fn from_records(records: &[PersistedMessage]) -> Result<Self> {
        let mut conversation = Self::new();
        for record in records {
            conversation.push(Message::from_record(record)?)?;
        }
        Ok(conversation)
    }

    pub fn to_records(&self) -> Vec<PersistedMessage> {
        self.messages.iter().map(Message::to_record).collect()
    }

    /// Records for every message appended at or after `mark`.
    pub fn records_since(&self, mark: usize) -> Vec<PersistedMessage> {
        self.messages
            .iter()
            .skip(mark)
            .map(Message::to_record)
            .collect()
    }

    /// Append in place. Fails without modifying `self` when the message would
    /// break the tool-call pairing rules.
    pub fn push(&mut self, message: Message) -> Result<()> {
        match &message {
            Message::Assistant { tool_calls, .. } => {
                let mut seen = HashSet::new();
                for call in tool_calls {
                    if call.id.is_empty() {
                        return Err(PilotError::Integrity(format!(
                            "tool call '{}' has an empty id",
                            call.tool_name
                        )));
                    }
                    if self.proposed.contains(&call.id) || !seen.insert(call.id.as_str()) {
                        return Err(PilotError::Integrity(format!(
                            "tool call id '{}' was already proposed",
                            call.id
                        )));
                    }
                }
                self.proposed
                    .extend(tool_calls.iter().map(|c| c.id.clone()));
                self.pending.extend(tool_calls.iter().cloned());
            }
            Message::ToolResult(result) => {
                let Some(index) = self
                    .pending
                    .iter()
                    .position(|c| c.id == result.tool_call_id)
                else {
                    return Err(PilotError::Integrity(
                        if self.proposed.contains(&result.tool_call_id) {
                            format!("tool call '{}' already has a result", result.tool_call_id)
                        } else {
                            format!(
                                "tool result references unknown call id '{}'",
                                result.tool_call_id
                            )
                        },
                    ));
                };
                self.pending.remove(index);
            }
            Message::Human { .. } => self.start_run(),
            Message::System { .. } => {}
        }
        self.messages.push(message);
        Ok(())
    }

    /// Forget answered ids so the next run may reuse them.
    fn start_run(&mut self) {
        self.proposed = self.pending.iter().map(|c| c.id.clone()).collect();
    }

    /// Append the user's text. Cannot break pairing, so it never fails.
    pub fn push_human(&mut self, text: impl Into<String>) {
        self.start_run();
        self.messages.push(Message::human(text));
    }

    /// Append an assistant reply that proposes no tool calls.
    pub fn push_reply(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    /// Return a new conversation with `message` appended, leaving `self` untouched.
    pub fn appended(&self, message: Message) -> Result<Self> {
        let mut next = self.clone();
        next.push(message)?;
        Ok(next)
    }

    pub fn extended(&self, messages: impl IntoIterator<Item = Message>) -> Result<Self> {
        let mut next = self.clone();
        for message in messages {
            next.push(message)?;
        }
        Ok(next)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Proposed calls that have no result yet, in proposal order.
    pub fn unanswered_calls(&self) -> Vec<&ToolCall> {
        self.pending.iter().collect()
    }
}
