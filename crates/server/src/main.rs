mod api;
mod router;
mod startup;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use shield_core::{config, Config};

/// Traffic shield inference server.
#[derive(Parser, Debug)]
#[command(name = "shield-server", version, about)]
struct Cli {
    /// Bind address (overrides HOST).
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides PORT).
    #[arg(long)]
    port: Option<u16>,

    /// Scorer artifact (overrides SCORER_PATH).
    #[arg(long)]
    scorer_path: Option<PathBuf>,

    /// Policy artifact (overrides POLICY_PATH).
    #[arg(long)]
    policy_path: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Config {
    config::load_dotenv();
    let mut config = Config::from_env();
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(path) = &cli.scorer_path {
        config.models.scorer_path = path.clone();
    }
    if let Some(path) = &cli.policy_path {
        config.models.policy_path = path.clone();
    }
    config
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    config.log_summary();

    let state = match startup::load_models(&config.models) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to load models, refusing to start");
            return Err(e).context("model artifacts unavailable (run `shield-train train` first)");
        }
    };

    let app = router::build_router(Arc::new(state), &config.server.cors_origin);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli);
    serve(&config).await
}
