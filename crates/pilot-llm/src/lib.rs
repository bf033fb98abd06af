//! # pilot-llm
//!
//! The reasoning capability behind DevPilot: a provider trait, an
//! OpenAI-compatible chat-completions client and a scripted mock.

pub mod mock;
pub mod openai;
pub mod provider;

pub use mock::MockProvider;
pub use openai::OpenAiProvider;
pub use provider::{LlmProvider, LlmRequest, LlmResponse, StopReason, Usage};
