#[cfg(test)]
mod tests {
    use pilot_config::ConfigLoader;
    use pilot_config::schema::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn valid_config() -> PilotConfig {
        let mut config = PilotConfig::default();
        config.backend.base_url = Some("http://localhost:8080".into());
        config
    }

    // ── Default tests ──────────────────────────────────────────

    #[test]
    fn test_agent_config_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.model, "openai/gpt-4o-mini");
        assert_eq!(config.max_cycles, 5);
        assert!(!config.parallel_tool_calls);
        assert!(config.clarification_keywords.contains(&"담당자".to_string()));
    }

    #[test]
    fn test_backend_config_defaults() {
        let config = BackendConfig::default();
        assert!(config.base_url.is_none());
        assert_eq!(config.path_prefix, "/api/agent");
        assert_eq!(config.call_timeout_secs, 30);
    }

    #[test]
    fn test_server_and_logging_defaults() {
        assert_eq!(ServerConfig::default().listen, "127.0.0.1:8000");
        assert!(!ServerConfig::default().cors);
        assert_eq!(LoggingConfig::default().level, "info");
        assert_eq!(LoggingConfig::default().format, "pretty");
    }

    #[test]
    fn test_replies_defaults_are_non_empty() {
        let replies = RepliesConfig::default();
        for text in [
            &replies.tool_failure,
            &replies.reasoning_failure,
            &replies.cycle_limit,
            &replies.authorization_required,
            &replies.configuration,
            &replies.invalid_history,
        ] {
            assert!(!text.is_empty());
        }
    }

    // ── TOML tests ─────────────────────────────────────────────

    #[test]
    fn test_config_toml_roundtrip() {
        let config = valid_config();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: PilotConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(restored.agent.model, config.agent.model);
        assert_eq!(restored.backend.base_url, config.backend.base_url);
        assert_eq!(restored.agent.replies, config.agent.replies);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = ConfigLoader::parse(
            r#"
[agent]
max_cycles = 3

[agent.replies]
tool_failure = "oops"

[backend]
base_url = "http://backend:8080"
"#,
        )
        .unwrap();
        assert_eq!(config.agent.max_cycles, 3);
        assert_eq!(config.agent.model, "openai/gpt-4o-mini");
        assert_eq!(config.agent.replies.tool_failure, "oops");
        assert_eq!(
            config.agent.replies.cycle_limit,
            RepliesConfig::default().cycle_limit
        );
        assert_eq!(config.backend.path_prefix, "/api/agent");
        assert_eq!(config.server.listen, "127.0.0.1:8000");
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = ConfigLoader::parse("").unwrap();
        assert_eq!(config.agent.max_cycles, 5);
        assert!(config.backend.base_url.is_none());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(ConfigLoader::parse("[agent\nmodel = ").is_err());
    }

    // ── System prompt tests ────────────────────────────────────

    #[test]
    fn test_system_prompt_resolution() {
        let mut agent = AgentConfig::default();
        assert_eq!(agent.resolve_system_prompt().unwrap(), DEFAULT_SYSTEM_PROMPT);

        agent.system_prompt = Some("inline".into());
        assert_eq!(agent.resolve_system_prompt().unwrap(), "inline");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "from file").unwrap();
        agent.system_prompt_file = Some(file.path().to_path_buf());
        assert_eq!(agent.resolve_system_prompt().unwrap(), "from file");
    }

    #[test]
    fn test_system_prompt_missing_file_is_config_error() {
        let agent = AgentConfig {
            system_prompt_file: Some("/nonexistent/prompt.txt".into()),
            ..AgentConfig::default()
        };
        assert!(agent.resolve_system_prompt().unwrap_err().is_config());
    }

    // ── Env override tests ─────────────────────────────────────

    #[test]
    fn test_env_overrides() {
        let config = ConfigLoader::apply_env_overrides(
            PilotConfig::default(),
            env(&[
                ("DEVPILOT_AGENT_MODEL", "openai/gpt-4o"),
                ("SPRING_BACKEND_URL", "http://spring:8080"),
                ("DEVPILOT_SERVER_LISTEN", "0.0.0.0:9000"),
                ("DEVPILOT_LOG_LEVEL", "debug"),
                ("DEVPILOT_DB_PATH", "/tmp/pilot.db"),
                ("OPENAI_API_KEY", "sk-env"),
            ]),
        );
        assert_eq!(config.agent.model, "openai/gpt-4o");
        assert_eq!(config.backend.base_url.as_deref(), Some("http://spring:8080"));
        assert_eq!(config.server.listen, "0.0.0.0:9000");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.memory.db_path.to_str(), Some("/tmp/pilot.db"));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));
    }

    #[test]
    fn test_devpilot_backend_url_wins_over_spring() {
        let config = ConfigLoader::apply_env_overrides(
            PilotConfig::default(),
            env(&[
                ("DEVPILOT_BACKEND_URL", "http://a:1"),
                ("SPRING_BACKEND_URL", "http://b:2"),
            ]),
        );
        assert_eq!(config.backend.base_url.as_deref(), Some("http://a:1"));
    }

    #[test]
    fn test_api_key_from_file_wins_over_env() {
        let mut config = PilotConfig::default();
        config.llm.api_key = Some("sk-file".into());
        let config =
            ConfigLoader::apply_env_overrides(config, env(&[("OPENAI_API_KEY", "sk-env")]));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-file"));
    }

    // ── Validation tests ───────────────────────────────────────

    #[test]
    fn test_validate_default_with_backend_is_ok() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_backend_is_warning_only() {
        let warnings = PilotConfig::default().validate().unwrap();
        assert!(
            warnings
                .iter()
                .any(|w| w.field == "backend.base_url" && w.severity == WarningSeverity::Warning)
        );
    }

    #[test]
    fn test_validate_hard_errors() {
        let mut config = valid_config();
        config.agent.model = String::new();
        config.agent.temperature = 3.0;
        config.agent.max_cycles = 0;
        config.backend.call_timeout_secs = 0;
        config.backend.base_url = Some("localhost:8080".into());
        let err = config.validate().unwrap_err();
        assert!(err.contains("agent.model"));
        assert!(err.contains("agent.temperature"));
        assert!(err.contains("agent.max_cycles"));
        assert!(err.contains("backend.call_timeout_secs"));
        assert!(err.contains("backend.base_url"));
    }

    #[test]
    fn test_validate_empty_listen_is_error() {
        let mut config = valid_config();
        config.server.listen = String::new();
        assert!(config.validate().unwrap_err().contains("server.listen"));
    }

    #[test]
    fn test_validate_blank_keyword_is_error() {
        let mut config = valid_config();
        config.agent.clarification_keywords.push("  ".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_warning_display() {
        let w = ConfigWarning {
            field: "server.listen".into(),
            message: "binding to 0.0.0.0".into(),
            severity: WarningSeverity::Warning,
            hint: Some("use localhost".into()),
        };
        let s = w.to_string();
        assert!(s.contains("server.listen"));
        assert!(s.contains("use localhost"));
    }

    // ── Loader tests ───────────────────────────────────────────

    #[test]
    fn test_config_loader_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("devpilot.toml");
        std::fs::write(
            &config_path,
            r#"
[agent]
max_cycles = 4

[backend]
base_url = "http://localhost:8080"
call_timeout_secs = 10
"#,
        )
        .unwrap();

        let loader = ConfigLoader::load(Some(config_path.as_path())).unwrap();
        let config = loader.get();
        assert_eq!(config.agent.max_cycles, 4);
        assert_eq!(config.backend.call_timeout_secs, 10);
        assert_eq!(loader.path(), config_path.as_path());
    }

    #[test]
    fn test_config_loader_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("devpilot.toml");
        std::fs::write(&config_path, "[agent]\nmax_tokens = 0\n").unwrap();
        let err = ConfigLoader::load(Some(config_path.as_path())).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_config_loader_unparseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("devpilot.toml");
        std::fs::write(&config_path, "not = [valid").unwrap();
        let err = ConfigLoader::load(Some(config_path.as_path())).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_resolve_path_explicit_wins() {
        let p = std::path::Path::new("/etc/devpilot.toml");
        assert_eq!(ConfigLoader::resolve_path(Some(p)), p.to_path_buf());
    }
}
