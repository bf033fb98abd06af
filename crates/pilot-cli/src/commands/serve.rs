use pilot_config::PilotConfig;
use tracing::warn;

pub(super) async fn cmd_serve(config: PilotConfig) -> pilot_core::Result<()> {
    println!("🧭 DevPilot v{}", env!("CARGO_PKG_VERSION"));
    println!("   Model: {}", config.agent.model);
    println!(
        "   Backend: {}",
        config.backend.base_url.as_deref().unwrap_or("(not set)")
    );
    println!("   History: {}", config.memory.db_path.display());
    println!("   Listening on http://{}", config.server.listen);
    println!();

    super::warn_missing_api_key(&config);
    if config.backend.base_url.is_none() {
        warn!("backend URL is not set; every tool call will fail with a configuration error");
    }

    let (agent, store) = super::build_agent(&config)?;
    pilot_server::start_server(config.server.clone(), agent, store).await
}
