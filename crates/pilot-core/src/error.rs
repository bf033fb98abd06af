use thiserror::Error;

/// Unified error type for the DevPilot workspace.
#[derive(Error, Debug)]
pub enum PilotError {
    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Reasoning errors ───────────────────────────────────────
    #[error("llm provider error: {0}")]
    LlmProvider(String),

    #[error("malformed reasoning output: {0}")]
    MalformedOutput(String),

    // ── Tool errors ────────────────────────────────────────────
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("authorization required")]
    AuthorizationRequired,

    // ── Backend errors ─────────────────────────────────────────
    #[error("backend transport error: {0}")]
    Transport(String),

    #[error("backend call timed out after {secs}s: {tool}")]
    Timeout { tool: String, secs: u64 },

    #[error("backend returned HTTP {status}: {detail}")]
    Backend { status: u16, detail: String },

    // ── Conversation / history errors ──────────────────────────
    #[error("conversation integrity violated: {0}")]
    Integrity(String),

    #[error("history store error: {0}")]
    History(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl PilotError {
    /// Whether this error stems from deployment configuration rather than the request.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::ConfigValidation { .. })
    }
}

pub type Result<T> = std::result::Result<T, PilotError>;
