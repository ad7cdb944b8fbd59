/*
crosslens - analysis backend
Builds event context from a news query and frame cards for each search hit.
*/

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use crosslens::cors::Cors;
use crosslens::extraction::engine_from_config;
use crosslens::server::{crosslens_rocket, figment, launch, AppState};
use crosslens::startup;

#[derive(Parser, Debug)]
#[command(name = "crosslens", about = "CrossLens context and frame analysis server")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    startup::init_tracing(&args.log_level);

    let config = match startup::load_config(args.config).await {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to load configuration: {:#}", e);
            return Err(e);
        }
    };

    let llm = startup::llm_from_config(&config.llm())?;
    let extraction = config.extraction();
    let engine = engine_from_config(&extraction)?;
    let concurrency = startup::concurrency_from_config(&extraction);
    info!(engine = engine.name(), concurrency, "extraction engine ready");

    let cors = Cors::from_config(config.server.as_ref().and_then(|s| s.allowed_origins.as_deref()));
    let state = AppState { llm, engine, concurrency };
    let rocket = crosslens_rocket(figment(config.server.as_ref()), state, cors);

    if let Err(e) = launch(rocket).await {
        error!(%e, "Rocket server failed");
        return Err(e);
    }
    info!("Shutdown complete");
    Ok(())
}
