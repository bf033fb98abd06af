use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::PilotConfig;

/// Loads the DevPilot configuration.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: PilotConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > DEVPILOT_CONFIG env > ~/.devpilot/devpilot.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("DEVPILOT_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".devpilot")
            .join("devpilot.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> pilot_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw).map_err(|e| {
                pilot_core::PilotError::Config(format!(
                    "failed to parse {}: {}",
                    config_path.display(),
                    e
                ))
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            PilotConfig::default()
        };

        // Apply environment variable overrides
        let config = Self::apply_env_overrides(config, |key| std::env::var(key).ok());

        // Validate config: log warnings, fail on errors
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(pilot_core::PilotError::Config(e));
            }
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Parse TOML text into a config. Missing sections and keys take defaults.
    pub fn parse(raw: &str) -> Result<PilotConfig, toml::de::Error> {
        toml::from_str::<PilotConfig>(raw)
    }

    /// Get a snapshot of the loaded config.
    pub fn get(&self) -> PilotConfig {
        self.config.clone()
    }

    /// Path the config was resolved from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (DEVPILOT_AGENT_MODEL, DEVPILOT_BACKEND_URL, etc.)
    /// using `lookup` to read variables.
    pub fn apply_env_overrides(
        mut config: PilotConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> PilotConfig {
        if let Some(v) = lookup("DEVPILOT_AGENT_MODEL") {
            config.agent.model = v;
        }
        // SPRING_BACKEND_URL is the name existing deployments already export.
        if let Some(v) = lookup("DEVPILOT_BACKEND_URL").or_else(|| lookup("SPRING_BACKEND_URL")) {
            config.backend.base_url = Some(v);
        }
        if let Some(v) = lookup("DEVPILOT_SERVER_LISTEN") {
            config.server.listen = v;
        }
        if let Some(v) = lookup("DEVPILOT_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Some(v) = lookup("DEVPILOT_DB_PATH") {
            config.memory.db_path = PathBuf::from(v);
        }
        // Config file takes priority, env is the fallback.
        if config.llm.api_key.is_none() {
            if let Some(v) = lookup("OPENAI_API_KEY") {
                config.llm.api_key = Some(v);
            }
        }
        config
    }
}
