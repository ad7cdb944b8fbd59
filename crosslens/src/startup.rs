//! Process bootstrap shared by both binaries: logging, configuration and
//! the vendor clients built from it.

use anyhow::{Context, Result};
use common::{resolve_secret, Config, ExtractionConfig, LlmConfig, TtsConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use crate::extraction::{DEFAULT_MAX_CONCURRENCY, MAX_CONCURRENCY_CAP};
use crate::llm::remote::RemoteLlmProvider;
use crate::llm::LlmProvider;
use crate::podcast::{PodcastSettings, MAX_LINKS};
use crate::tts::{gemini, GeminiTtsProvider, TtsProvider};

pub const DEFAULT_CONFIG_PATH: &str = "config.default.toml";
pub const OVERRIDE_CONFIG_PATH: &str = "config.toml";

const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TTS_VOICE: &str = "Kore";
const DEFAULT_STATIC_DIR: &str = "crosslens/static";

/// Install the global fmt subscriber. Unknown levels fall back to `info`.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}

/// Load `.env`, then `config.default.toml` merged with `explicit` (which must
/// exist) or `config.toml` (if present), then the environment overrides.
pub async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    if let Ok(path) = dotenv::dotenv() {
        info!(path = %path.display(), ".env loaded");
    }

    let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let override_path = match explicit {
        Some(p) => {
            if !p.exists() {
                error!(path = ?p, "specified config file not found");
                anyhow::bail!("Config file not found: {}", p.display());
            }
            Some(p)
        }
        None => Some(PathBuf::from(OVERRIDE_CONFIG_PATH)).filter(|p| p.exists()),
    };

    let mut config = Config::load_with_defaults(
        Some(default_path.as_path()).filter(|p| p.exists()),
        override_path.as_deref(),
    )
    .await?;
    config.apply_env_overrides();

    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}

/// Build the chat-completions client. A missing API key is fatal.
pub fn llm_from_config(cfg: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    let api_key = resolve_secret("llm", cfg.api_key_env.as_deref())?;
    let api_url = cfg.api_url.as_deref().unwrap_or(DEFAULT_LLM_API_URL);
    let model = cfg.model.as_deref().unwrap_or(DEFAULT_LLM_MODEL);

    let provider = RemoteLlmProvider::new(api_url, api_key, model).with_defaults(
        cfg.timeout_seconds.unwrap_or(60),
        cfg.max_tokens.unwrap_or(2000),
        cfg.temperature,
    );
    info!(%model, %api_url, "LLM provider initialized");
    Ok(Arc::new(provider))
}

/// Build the Gemini TTS client. A missing API key is fatal.
pub fn tts_from_config(cfg: &TtsConfig) -> Result<Arc<dyn TtsProvider>> {
    let api_key = resolve_secret("tts", cfg.api_key_env.as_deref())?;
    Ok(Arc::new(gemini_from_config(cfg, api_key)?))
}

fn gemini_from_config(cfg: &TtsConfig, api_key: String) -> Result<GeminiTtsProvider> {
    let api_url = cfg.api_url.as_deref().unwrap_or(gemini::DEFAULT_API_URL);
    let model = cfg.model.as_deref().unwrap_or(gemini::DEFAULT_MODEL);

    let mut provider =
        GeminiTtsProvider::new(api_url, api_key, model).with_timeout(cfg.timeout_seconds.unwrap_or(120));
    if let Some(generation) = &cfg.generation_config {
        let generation = serde_json::to_value(generation).context("Invalid [tts] generation_config")?;
        provider = provider.with_generation_config(generation);
    }
    info!(%model, generation_config = cfg.generation_config.is_some(), "TTS provider initialized");
    Ok(provider)
}

/// Effective fan-out per request.
pub fn concurrency_from_config(cfg: &ExtractionConfig) -> usize {
    cfg.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY).clamp(1, MAX_CONCURRENCY_CAP)
}

/// Podcast settings with the static directory created on disk.
pub async fn podcast_settings(config: &Config) -> Result<PodcastSettings> {
    let podcast = config.podcast();
    let settings = PodcastSettings {
        static_dir: PathBuf::from(podcast.static_dir.as_deref().unwrap_or(DEFAULT_STATIC_DIR)),
        max_links: podcast.max_links.unwrap_or(MAX_LINKS).clamp(1, MAX_LINKS),
        default_voice: config.tts().voice.unwrap_or_else(|| DEFAULT_TTS_VOICE.to_string()),
        concurrency: concurrency_from_config(&config.extraction()),
    };
    ensure_dir(&settings.audio_dir()).await?;
    Ok(settings)
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create directory {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_is_clamped() {
        let mut cfg = ExtractionConfig::default();
        assert_eq!(concurrency_from_config(&cfg), DEFAULT_MAX_CONCURRENCY);
        cfg.max_concurrency = Some(0);
        assert_eq!(concurrency_from_config(&cfg), 1);
        cfg.max_concurrency = Some(64);
        assert_eq!(concurrency_from_config(&cfg), MAX_CONCURRENCY_CAP);
    }

    #[test]
    fn llm_without_key_env_fails_fast() {
        let err = llm_from_config(&LlmConfig::default()).err().unwrap();
        assert!(err.to_string().contains("api_key_env"));
    }

    #[tokio::test]
    async fn tts_generation_config_is_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-flash-preview-tts:generateContent")
            .match_query(mockito::Matcher::Any)
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "generationConfig": { "temperature": 0.9 }
            })))
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "candidates": [{ "content": { "parts": [
                        { "inlineData": { "mimeType": "audio/mpeg", "data": "AAAA" } }
                    ]}}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let cfg: TtsConfig = toml::from_str(&format!(
            "api_url = \"{}\"\ngeneration_config = {{ temperature = 0.9 }}\n",
            server.url()
        ))
        .unwrap();

        let provider = gemini_from_config(&cfg, "secret".into()).unwrap();
        provider.synthesize("Ciao", "Kore").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn podcast_settings_create_audio_dir() {
        let dir = tempfile::tempdir().unwrap();
        let static_dir = dir.path().join("static");
        let config = Config {
            podcast: Some(common::PodcastConfig {
                static_dir: Some(static_dir.display().to_string()),
                max_links: Some(50),
                port: None,
            }),
            tts: Some(TtsConfig { voice: Some("Puck".into()), ..Default::default() }),
            ..Default::default()
        };

        let settings = podcast_settings(&config).await.unwrap();
        assert!(static_dir.join("audio").is_dir());
        assert_eq!(settings.max_links, MAX_LINKS);
        assert_eq!(settings.default_voice, "Puck");
    }
}
