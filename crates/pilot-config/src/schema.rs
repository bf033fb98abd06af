use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration, maps to `devpilot.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    pub agent: AgentConfig,
    pub backend: BackendConfig,
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

// ── Agent ──────────────────────────────────────────────────────

/// Built-in directive used when neither `system_prompt` nor `system_prompt_file` is set.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
당신은 DevPilot, 사용자의 프로젝트와 작업을 관리하는 어시스턴트입니다.
사용 가능한 도구로 프로젝트와 작업을 생성, 조회, 수정, 삭제할 수 있습니다.
도구 호출에 필요한 정보(예: 프로젝트 이름, 작업 제목, 마감일)가 부족하면 도구를 호출하지 말고 사용자에게 먼저 질문하세요.
사용자 인증 정보나 사용자 ID는 절대 직접 입력하거나 요청하지 마세요.
날짜는 YYYY-MM-DD 형식을, 우선순위는 1에서 5 사이의 정수를 사용하세요.
도구 실행 결과를 바탕으로 한국어로 간결하게 답변하세요.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model identifier, e.g. "openai/gpt-4o-mini".
    pub model: String,
    /// System directive sent with every reasoning request.
    pub system_prompt: Option<String>,
    /// Path to a file containing the system directive (overrides `system_prompt`).
    pub system_prompt_file: Option<PathBuf>,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Temperature (0.0 - 2.0).
    pub temperature: f32,
    /// Maximum reasoning/execution cycles per turn.
    pub max_cycles: u32,
    /// Dispatch read-only batches concurrently.
    pub parallel_tool_calls: bool,
    /// Keywords that mark an assistant reply as a clarifying question.
    pub clarification_keywords: Vec<String>,
    /// Fixed texts returned when a run cannot produce a model answer.
    pub replies: RepliesConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "openai/gpt-4o-mini".into(),
            system_prompt: None,
            system_prompt_file: None,
            max_tokens: 4096,
            temperature: 0.2,
            max_cycles: 5,
            parallel_tool_calls: false,
            clarification_keywords: ["무엇", "어떤", "언제", "누구", "담당자", "이름"]
                .into_iter()
                .map(String::from)
                .collect(),
            replies: RepliesConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Resolve the system directive: file > inline text > built-in default.
    pub fn resolve_system_prompt(&self) -> pilot_core::Result<String> {
        if let Some(path) = &self.system_prompt_file {
            return std::fs::read_to_string(path).map_err(|e| {
                pilot_core::PilotError::Config(format!(
                    "failed to read system prompt file {}: {}",
                    path.display(),
                    e
                ))
            });
        }
        Ok(self
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepliesConfig {
    pub tool_failure: String,
    pub reasoning_failure: String,
    pub cycle_limit: String,
    pub authorization_required: String,
    pub configuration: String,
    pub invalid_history: String,
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            tool_failure: "죄송합니다. 요청을 처리하는 중 오류가 발생했습니다. 잠시 후 다시 시도해주세요.".into(),
            reasoning_failure: "죄송합니다. 지금은 요청을 이해하지 못했습니다. 다시 한 번 말씀해주시겠어요.".into(),
            cycle_limit: "죄송합니다. 요청을 완료할 수 없었습니다. 요청을 나누어 다시 시도해주세요.".into(),
            authorization_required: "인증이 필요합니다. 다시 로그인한 뒤 시도해주세요.".into(),
            configuration: "서비스 설정 오류로 요청을 처리할 수 없습니다. 관리자에게 문의해주세요.".into(),
            invalid_history: "대화 기록을 불러오는 중 문제가 발생했습니다. 새 대화로 다시 시도해주세요.".into(),
        }
    }
}

// ── Backend ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the project/task backend, e.g. "http://localhost:8080".
    pub base_url: Option<String>,
    /// Path prefix prepended to every operation path.
    pub path_prefix: String,
    /// Hard per-call timeout.
    pub call_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            path_prefix: "/api/agent".into(),
            call_timeout_secs: 30,
        }
    }
}

// ── LLM ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key for the OpenAI-compatible endpoint. Falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// Override the chat-completions base URL (for proxies and compatible servers).
    pub base_url: Option<String>,
}

// ── Memory ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Path to the SQLite history database.
    pub db_path: PathBuf,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("devpilot.db"),
        }
    }
}

// ── Server ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address.
    pub listen: String,
    /// Enable permissive CORS.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8000".into(),
            cors: false,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl PilotConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Agent model ───
        let model = &self.agent.model;
        if model.is_empty() {
            warnings.push(ConfigWarning {
                field: "agent.model".into(),
                message: "model is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'openai/gpt-4o-mini'".into()),
            });
        } else if !model.contains('/') {
            warnings.push(ConfigWarning {
                field: "agent.model".into(),
                message: format!("model '{}' has no provider prefix, assuming openai", model),
                severity: WarningSeverity::Info,
                hint: Some("Use 'openai/<model>'".into()),
            });
        }

        // ── Temperature ───
        if self.agent.temperature < 0.0 || self.agent.temperature > 2.0 {
            warnings.push(ConfigWarning {
                field: "agent.temperature".into(),
                message: format!("temperature {} is out of range", self.agent.temperature),
                severity: WarningSeverity::Error,
                hint: Some("Temperature must be between 0.0 and 2.0".into()),
            });
        }

        // ── Max tokens ───
        if self.agent.max_tokens == 0 {
            warnings.push(ConfigWarning {
                field: "agent.max_tokens".into(),
                message: "max_tokens is 0, the model cannot produce output".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 4096".into()),
            });
        }

        // ── Cycle bound ───
        if self.agent.max_cycles == 0 {
            warnings.push(ConfigWarning {
                field: "agent.max_cycles".into(),
                message: "max_cycles is 0, no tool call could ever run".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 5".into()),
            });
        } else if self.agent.max_cycles > 20 {
            warnings.push(ConfigWarning {
                field: "agent.max_cycles".into(),
                message: format!("max_cycles {} is very high", self.agent.max_cycles),
                severity: WarningSeverity::Warning,
                hint: Some("Each cycle is a model call; 3-8 is typical".into()),
            });
        }

        // ── Clarification keywords ───
        if self.agent.clarification_keywords.iter().any(|k| k.trim().is_empty()) {
            warnings.push(ConfigWarning {
                field: "agent.clarification_keywords".into(),
                message: "empty keyword would mark every reply as a clarification".into(),
                severity: WarningSeverity::Error,
                hint: Some("Remove blank entries".into()),
            });
        }

        // ── Backend ───
        match self.backend.base_url.as_deref() {
            None | Some("") => warnings.push(ConfigWarning {
                field: "backend.base_url".into(),
                message: "backend URL is not set, every tool call will fail".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set backend.base_url or SPRING_BACKEND_URL".into()),
            }),
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                warnings.push(ConfigWarning {
                    field: "backend.base_url".into(),
                    message: format!("'{}' is not an http(s) URL", url),
                    severity: WarningSeverity::Error,
                    hint: Some("Use e.g. 'http://localhost:8080'".into()),
                })
            }
            Some(_) => {}
        }

        if self.backend.call_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "backend.call_timeout_secs".into(),
                message: "call timeout is 0, every call would time out".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 30".into()),
            });
        }

        if !self.backend.path_prefix.is_empty() && !self.backend.path_prefix.starts_with('/') {
            warnings.push(ConfigWarning {
                field: "backend.path_prefix".into(),
                message: format!("path prefix '{}' should start with '/'", self.backend.path_prefix),
                severity: WarningSeverity::Warning,
                hint: None,
            });
        }

        // ── LLM key ───
        if self.llm.api_key.is_none() {
            warnings.push(ConfigWarning {
                field: "llm.api_key".into(),
                message: "no API key configured".into(),
                severity: WarningSeverity::Info,
                hint: Some("Set llm.api_key or OPENAI_API_KEY".into()),
            });
        }

        // ── Server listen address ───
        if self.server.listen.is_empty() {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "listen address is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. '127.0.0.1:8000'".into()),
            });
        } else if self.server.listen.starts_with("0.0.0.0") {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "binding to 0.0.0.0, server is accessible from all interfaces".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Use '127.0.0.1:8000' for local-only access".into()),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
