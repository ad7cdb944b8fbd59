/*!
common/src/lib.rs

Shared configuration types for CrossLens.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader merging a default file with an optional override file
- Environment-backed secret resolution and model/voice overrides
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding `llm.model`.
pub const ENV_LLM_MODEL: &str = "CROSSLENS_LLM_MODEL";
/// Environment variable overriding `tts.model`.
pub const ENV_TTS_MODEL: &str = "CROSSLENS_TTS_MODEL";
/// Environment variable overriding `tts.voice`.
pub const ENV_TTS_VOICE: &str = "CROSSLENS_TTS_VOICE";

/// HTTP listener configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    /// Browser origins allowed to call the API; `"*"` allows any
    pub allowed_origins: Option<Vec<String>>,
}

/// Remote LLM config (OpenAI-compatible chat completions endpoint)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_url: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

/// Article extraction configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// "browser" (headless Chromium) or "http" (plain fetch)
    pub engine: Option<String>,
    pub navigation_timeout_secs: Option<u64>,
    pub max_concurrency: Option<usize>,
    /// Extracted text shorter than this is treated as a partial extraction
    pub min_text_chars: Option<usize>,
    /// Case-insensitive markers of paywalls and anti-bot interstitials
    pub paywall_markers: Option<Vec<String>>,
    pub chrome_executable: Option<String>,
    pub user_agent: Option<String>,
}

/// Text-to-speech configuration (Gemini generateContent API)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtsConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Sent verbatim as the request's `generationConfig`
    pub generation_config: Option<toml::Value>,
}

/// Podcast service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodcastConfig {
    /// Directory served under `/static`; audio lands in `<static_dir>/audio`
    pub static_dir: Option<String>,
    pub max_links: Option<usize>,
    /// Listener port for the podcast binary; `server.port` otherwise
    pub port: Option<u16>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: Option<ServerConfig>,
    pub llm: Option<LlmConfig>,
    pub extraction: Option<ExtractionConfig>,
    pub tts: Option<TtsConfig>,
    pub podcast: Option<PodcastConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path).await
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// Apply model/voice overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var(ENV_LLM_MODEL) {
            self.llm.get_or_insert_with(Default::default).model = Some(model);
        }
        if let Ok(model) = std::env::var(ENV_TTS_MODEL) {
            self.tts.get_or_insert_with(Default::default).model = Some(model);
        }
        if let Ok(voice) = std::env::var(ENV_TTS_VOICE) {
            self.tts.get_or_insert_with(Default::default).voice = Some(voice);
        }
    }

    pub fn llm(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }

    pub fn extraction(&self) -> ExtractionConfig {
        self.extraction.clone().unwrap_or_default()
    }

    pub fn tts(&self) -> TtsConfig {
        self.tts.clone().unwrap_or_default()
    }

    pub fn podcast(&self) -> PodcastConfig {
        self.podcast.clone().unwrap_or_default()
    }
}

/// Read a secret from the environment variable named by `env_name`.
///
/// Called once at startup so a missing key stops the process instead of
/// failing every request.
pub fn resolve_secret(section: &str, env_name: Option<&str>) -> Result<String> {
    let env_name = env_name
        .with_context(|| format!("Missing api_key_env in [{}] config", section))?;
    let value = std::env::var(env_name)
        .with_context(|| format!("API key env var '{}' not set", env_name))?;
    if value.trim().is_empty() {
        anyhow::bail!("API key env var '{}' is empty", env_name);
    }
    Ok(value)
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
