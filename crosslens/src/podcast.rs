//! Podcast generation: summarise each linked article and voice the summary.

use anyhow::Context;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;
use url::Url;

use crate::aggregate::{aggregate, TargetGroup};
use crate::error::ServiceError;
use crate::extraction::{ExtractionEngine, ExtractionOutcome, ExtractionTarget};
use crate::fallback::compose;
use crate::llm::payload::required_str;
use crate::llm::{generate_structured, JsonSchema, LlmProvider, LlmRequest};
use crate::models::{GenerationRequest, GenerationResponse, GenerationResult};
use crate::pipeline::run_batch;
use crate::tts::TtsProvider;

/// Hard upper bound on links per request, whatever the configuration says.
pub const MAX_LINKS: usize = 10;

const SYSTEM_PROMPT: &str = "You write short spoken news segments for a podcast. You receive the text \
of one article (or, when marked partial, only its address and title). Produce a title and a summary of \
at most 120 words, written to be read aloud, in the language of the article. Reply only with JSON \
matching the schema. Do not invent facts that are not in the content.";

fn response_schema() -> JsonSchema {
    JsonSchema::new(
        "crosslens_podcast_schema",
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "title": { "type": "string" },
                "summary": { "type": "string" }
            },
            "required": ["title", "summary"]
        }),
    )
}

#[derive(Debug, Clone)]
pub struct PodcastSettings {
    /// Served under `/static`; audio files go to `<static_dir>/audio`.
    pub static_dir: PathBuf,
    pub max_links: usize,
    pub default_voice: String,
    pub concurrency: usize,
}

impl PodcastSettings {
    pub fn audio_dir(&self) -> PathBuf {
        self.static_dir.join("audio")
    }

    fn link_limit(&self) -> usize {
        self.max_links.clamp(1, MAX_LINKS)
    }
}

/// Everything the podcast service talks to.
pub struct PodcastServices<'a> {
    pub llm: &'a dyn LlmProvider,
    pub tts: &'a dyn TtsProvider,
    pub engine: &'a dyn ExtractionEngine,
}

/// Returns each link as sent (trimmed) with its parsed form.
fn validate_links(links: &[String], limit: usize) -> Result<Vec<(String, Url)>, ServiceError> {
    if links.is_empty() {
        return Err(ServiceError::invalid("At least one link is required"));
    }
    if links.len() > limit {
        return Err(ServiceError::invalid(format!("At most {} links are allowed", limit)));
    }

    links
        .iter()
        .map(|raw| {
            let link = raw.trim();
            let url = Url::parse(link)
                .map_err(|e| ServiceError::invalid(format!("Invalid link '{}': {}", raw, e)))?;
            match (url.scheme(), url.host_str()) {
                ("http" | "https", Some(_)) => Ok((link.to_string(), url)),
                _ => Err(ServiceError::invalid(format!("Link must be an http(s) URL: {}", raw))),
            }
        })
        .collect()
}

/// The link as sent is the target's identity.
fn target_for(link: &str, url: &Url) -> ExtractionTarget {
    let host = url.host_str().unwrap_or_default().trim_start_matches("www.").to_string();
    ExtractionTarget {
        url: link.to_string(),
        source: host.clone(),
        domain: host.clone(),
        title: host,
        snippet: link.to_string(),
    }
}

/// Summarise and voice every link, in request order.
pub async fn generate_audio(
    services: PodcastServices<'_>,
    settings: &PodcastSettings,
    request: &GenerationRequest,
) -> Result<GenerationResponse, ServiceError> {
    let links = validate_links(&request.links, settings.link_limit())?;
    let voice = request
        .voice
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(settings.default_voice.as_str());

    let audio_dir = settings.audio_dir();
    tokio::fs::create_dir_all(&audio_dir)
        .await
        .with_context(|| format!("Failed to create audio directory {}", audio_dir.display()))?;

    let targets: Vec<ExtractionTarget> = links.iter().map(|(link, url)| target_for(link, url)).collect();
    info!(links = targets.len(), voice, "podcast: generation started");

    let results = run_batch(services.engine, &targets, settings.concurrency, |_, target, outcome| {
        episode_for_target(&services, voice, &audio_dir, target, outcome)
    })
    .await?;

    let groups = [TargetGroup { key: "links".to_string(), targets }];
    let results = aggregate(&groups, results)?.into_flat();
    info!(results = results.len(), "podcast: generation complete");

    Ok(GenerationResponse { results })
}

async fn episode_for_target(
    services: &PodcastServices<'_>,
    voice: &str,
    audio_dir: &Path,
    target: ExtractionTarget,
    outcome: ExtractionOutcome,
) -> Result<GenerationResult, ServiceError> {
    let body = compose(&target, &outcome);
    let prompt = format!(
        "URL: {}\nContent completeness: {}\n\nContent:\n{}",
        target.url,
        if body.partial { "partial" } else { "complete" },
        body.text.trim()
    );

    let payload = generate_structured(
        services.llm,
        LlmRequest {
            system: Some(SYSTEM_PROMPT.to_string()),
            prompt,
            response_schema: Some(response_schema()),
            ..Default::default()
        },
    )
    .await?;
    let title = required_str(&payload, "title")?;
    let summary = required_str(&payload, "summary")?;

    let audio = services
        .tts
        .synthesize(&summary, voice)
        .await
        .with_context(|| format!("Speech synthesis failed for {}", target.url))?
        .into_playable()?;

    let file_name = format!("{}.{}", uuid::Uuid::new_v4(), audio.extension());
    let path = audio_dir.join(&file_name);
    tokio::fs::write(&path, &audio.bytes)
        .await
        .with_context(|| format!("Failed to write audio file {}", path.display()))?;
    info!(url = %target.url, file = %file_name, bytes = audio.bytes.len(), "podcast: audio written");

    Ok(GenerationResult {
        url: target.url,
        title,
        summary,
        audio_url: format!("/static/audio/{}", file_name),
        partial: body.partial,
    })
}
