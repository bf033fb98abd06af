//! # pilot-runtime
//!
//! The DevPilot agent loop: reason, execute tools, reason again, until the
//! model answers or asks the user for more information.
//!
//! ```text
//!   user input ──► Reasoning ──► text ────────────► Done
//!                     │   ▲        └─ question ──► Clarifying ──► Done
//!                tool calls │
//!                     ▼   │ all succeeded
//!                  Executing ──── any error ─────► Done
//! ```

pub mod agent_loop;
pub mod executor;
pub mod reasoning;

pub use agent_loop::{Agent, LoopState, RunOutcome, RunState, TurnInput, TurnOutput};
pub use executor::{ExecutionReport, ToolExecutor};
pub use reasoning::{
    ClarificationDetector, KeywordDetector, LlmReasoner, Reasoner, ReasoningOutcome,
    provider_model,
};
