/*
podcast_server - turns a list of article links into short voiced summaries.
Serves the frontend and the generated audio from the configured static directory.
*/

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use crosslens::extraction::engine_from_config;
use crosslens::server::{figment, launch, podcast_rocket, PodcastState};
use crosslens::startup;

#[derive(Parser, Debug)]
#[command(name = "podcast_server", about = "CrossLens podcast generation server")]
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
    let tts = startup::tts_from_config(&config.tts())?;
    let engine = engine_from_config(&config.extraction())?;
    let settings = startup::podcast_settings(&config).await?;
    info!(
        static_dir = %settings.static_dir.display(),
        max_links = settings.max_links,
        voice = %settings.default_voice,
        "podcast service ready"
    );

    let state = PodcastState { llm, engine, tts, settings };
    let mut server = config.server.clone().unwrap_or_default();
    if let Some(port) = config.podcast().port {
        server.port = Some(port);
    }
    let rocket = podcast_rocket(figment(Some(&server)), state);

    if let Err(e) = launch(rocket).await {
        error!(%e, "Rocket server failed");
        return Err(e);
    }
    info!("Shutdown complete");
    Ok(())
}
