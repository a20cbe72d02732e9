//! Rever HTTP server
//!
//! Discovers Retool agents, then serves OpenAI-compatible chat completions.

use clap::Parser;
use rever::{
    cli::{Cli, Command, generate_config_template},
    config::Config,
    handlers::{self, AppState},
    telemetry,
    upstream::RetoolClient,
};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Config { output }) => write_config_template(output.as_deref()),
        Some(Command::Models) => list_models(&cli.config).await,
        None => serve(&cli.config).await,
    }
}

fn write_config_template(output: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let template = generate_config_template();
    match output {
        Some(path) => {
            std::fs::write(path, template)?;
            eprintln!("Configuration template written to {}", path);
        }
        None => print!("{}", template),
    }
    Ok(())
}

fn build_state(config: Config) -> Result<AppState, Box<dyn std::error::Error>> {
    let client = RetoolClient::new(&config.upstream)?;
    Ok(AppState::new(config, Arc::new(client))?)
}

async fn list_models(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file(config_path)?;
    telemetry::init(&config.observability.log_level);

    let state = build_state(config)?;
    let registry = state.refresh_models().await;

    for model in registry.models() {
        println!(
            "{:<32} {:<10} {} account(s)  {}",
            model.id,
            model.owned_by,
            model.bindings.len(),
            model.display_name()
        );
    }
    for (account, agents) in registry.agents_per_account() {
        eprintln!("{}: {} agent(s)", account, agents);
    }
    Ok(())
}

async fn serve(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file(config_path)?;
    let logs = telemetry::init(&config.observability.log_level);

    tracing::info!(
        accounts = config.accounts.len(),
        api_keys = config.auth.key_count(),
        "Starting Rever on {}:{}",
        config.server.host,
        config.server.port
    );

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        config.server.port,
    ));

    let state = build_state(config)?.with_log_control(logs);

    // Requests must never observe a partial registry, so discovery finishes first
    let registry = state.refresh_models().await;
    if registry.is_empty() {
        tracing::warn!("No models discovered; every completion request will return 404");
    }

    let app = handlers::router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
