//! # pilot-config
//!
//! Configuration for DevPilot. Reads from `devpilot.toml`, then applies
//! environment variable overrides.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::PilotConfig;
pub use schema::{
    AgentConfig, BackendConfig, ConfigWarning, DEFAULT_SYSTEM_PROMPT, LlmConfig, LoggingConfig,
    MemoryConfig, RepliesConfig, ServerConfig, WarningSeverity,
};
