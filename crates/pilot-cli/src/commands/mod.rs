use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pilot_config::{ConfigLoader, PilotConfig};
use pilot_core::{PilotError, SubjectId};
use pilot_llm::OpenAiProvider;
use pilot_memory::{HistoryStore, SqliteHistoryStore};
use pilot_runtime::Agent;
use pilot_tools::{HttpBackend, Operation};

mod chat;
mod serve;

/// DevPilot: conversational project and task assistant
#[derive(Parser)]
#[command(name = "devpilot", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to devpilot.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve,
    /// Interactive chat in the terminal
    Chat {
        /// User id the conversation runs for; enables stored history
        #[arg(short, long)]
        user_id: Option<SubjectId>,
        /// Bearer token forwarded to the backend
        #[arg(short, long, env = "DEVPILOT_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// List the backend operations the agent can call
    Tools {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub async fn run(self) -> pilot_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        init_logging(
            &config,
            resolve_log_level(
                self.verbose,
                self.quiet,
                self.log_level.as_deref(),
                &config.logging.level,
            ),
        );

        match self.command {
            Commands::Serve => serve::cmd_serve(config).await,
            Commands::Chat { user_id, token } => chat::cmd_chat(config, user_id, token).await,
            Commands::Tools { json } => Self::cmd_tools(json),
            Commands::Config { json } => Self::cmd_config(config, json),
        }
    }

    fn cmd_tools(json: bool) -> pilot_core::Result<()> {
        let registry = pilot_tools::ToolRegistry::builtin()?;

        if json {
            let tools: Vec<serde_json::Value> = registry
                .definitions()
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "name": d.name,
                        "description": d.description,
                        "parameters": d.json_schema(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&tools)?);
            return Ok(());
        }

        println!("\x1b[1mTools\x1b[0m ({})", registry.len());
        for op in Operation::ALL {
            println!(
                "  {:<30} {:<6} {}",
                op.name(),
                op.method().as_str(),
                op.path_template()
            );
            println!("  \x1b[90m{}\x1b[0m", op.description());
        }
        Ok(())
    }

    fn cmd_config(config: PilotConfig, json: bool) -> pilot_core::Result<()> {
        let config = redacted(config);
        if json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| PilotError::Config(e.to_string()))?
            );
        }
        Ok(())
    }
}

/// Resolve log level: --verbose > --quiet > --log-level > config.
fn resolve_log_level<'a>(
    verbose: bool,
    quiet: bool,
    flag: Option<&'a str>,
    configured: &'a str,
) -> &'a str {
    if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        flag.unwrap_or(configured)
    }
}

/// Initialize tracing. `RUST_LOG` wins over the resolved level.
fn init_logging(config: &PilotConfig, log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

/// Copy of the config with secrets masked, for display.
fn redacted(mut config: PilotConfig) -> PilotConfig {
    if config.llm.api_key.is_some() {
        config.llm.api_key = Some("***".into());
    }
    config
}

/// Wire the agent and history store from configuration.
pub(crate) fn build_agent(config: &PilotConfig) -> pilot_core::Result<(Agent, Arc<dyn HistoryStore>)> {
    let mut provider = OpenAiProvider::new(config.llm.api_key.clone().unwrap_or_default());
    if let Some(ref url) = config.llm.base_url {
        provider = provider.with_base_url(url);
    }

    let backend = HttpBackend::new(config.backend.base_url.clone(), &config.backend.path_prefix)
        .with_timeout(Duration::from_secs(config.backend.call_timeout_secs));

    let agent = Agent::from_config(config, Arc::new(provider), Arc::new(backend))?;
    let store: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::open(&config.memory.db_path)?);
    Ok((agent, store))
}

/// Print a hint when no model API key is configured.
pub(crate) fn warn_missing_api_key(config: &PilotConfig) {
    if config.llm.api_key.as_deref().is_none_or(str::is_empty) {
        eprintln!("⚠️  No LLM API key found. The agent won't be able to think.");
        eprintln!("   In devpilot.toml:  [llm]");
        eprintln!("                      api_key = \"sk-...\"");
        eprintln!("   Or env var:        export OPENAI_API_KEY=sk-...");
        eprintln!();
    }
}
