//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};

use crate::aggregate::Identified;

// ---------------------------------------------------------------------------
// Context builder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBuildRequest {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBuildResponse {
    pub normalized_query: String,
    pub nations_involved: Vec<String>,
    pub actors: Vec<String>,
    pub organizations: Vec<String>,
    pub topic_category: String,
    pub event_signature: String,
}

// ---------------------------------------------------------------------------
// Frame analysis
// ---------------------------------------------------------------------------

/// One search hit to analyse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub source: String,
    #[serde(default)]
    pub domain: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCountryResults {
    pub country: String,
    #[serde(default)]
    pub items: Vec<SearchResultItem>,
}

/// Known political orientation of an outlet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedSource {
    pub country: String,
    pub source: String,
    pub orientation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramesAnalyzeRequest {
    pub event_signature: String,
    #[serde(default)]
    pub per_country_results: Vec<SearchCountryResults>,
    #[serde(default)]
    pub resolved_sources: Vec<ResolvedSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameCard {
    pub tone: String,
    pub stance: String,
    pub frame_label: String,
    pub key_claims: Vec<String>,
    pub evidence_level: String,
    pub orientation_inherited: Option<String>,
    pub orientation_detected: Option<String>,
    pub partial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleFrame {
    pub country: String,
    pub source: String,
    pub domain: String,
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Present only when the article body was extracted in full.
    pub extracted_text: Option<String>,
    pub frame_card: FrameCard,
}

impl Identified for ArticleFrame {
    fn target_url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramesAnalyzeResponse {
    pub event_signature: String,
    pub frames: Vec<ArticleFrame>,
}

// ---------------------------------------------------------------------------
// Podcast generation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub links: Vec<String>,
    /// Overrides the configured TTS voice
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub audio_url: String,
    /// The summary was written from fallback text, not the article body
    pub partial: bool,
}

impl Identified for GenerationResult {
    fn target_url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub results: Vec<GenerationResult>,
}
