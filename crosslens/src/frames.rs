//! Frame analysis: extract each search hit and ask the model for a frame card
//! describing how the outlet frames the event.

use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::info;

use crate::aggregate::{aggregate, TargetGroup};
use crate::error::ServiceError;
use crate::extraction::{ExtractionEngine, ExtractionOutcome, ExtractionTarget};
use crate::fallback::{compose, ComposedText};
use crate::llm::payload::{optional_bool, optional_str, required_list, required_str};
use crate::llm::{generate_structured, JsonSchema, LlmProvider, LlmRequest};
use crate::models::{ArticleFrame, FrameCard, FramesAnalyzeRequest, FramesAnalyzeResponse, ResolvedSource};
use crate::pipeline::run_batch;

const SYSTEM_PROMPT: &str = "You are a media analyst for CrossLens. You receive one newspaper article: \
country, outlet, known orientation, title, search snippet and extracted text. Produce ONE frame card \
describing tone, stance, frame label, key claims (2-5 short points), evidence level and, if visible, \
the orientation detected in the text. Reply only with JSON matching the schema. When the content is \
marked partial, set the partial field accordingly.";

fn response_schema() -> JsonSchema {
    JsonSchema::new(
        "crosslens_frame_schema",
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "tone": { "type": "string" },
                "stance": { "type": "string" },
                "frame_label": { "type": "string" },
                "key_claims": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 2,
                    "maxItems": 5
                },
                "evidence_level": { "type": "string" },
                "orientation_inherited": { "type": ["string", "null"] },
                "orientation_detected": { "type": ["string", "null"] },
                "partial": { "type": "boolean" }
            },
            "required": ["tone", "stance", "frame_label", "key_claims", "evidence_level", "partial"]
        }),
    )
}

/// Orientation lookup keyed by (uppercased country, lowercased source).
struct OrientationMap(HashMap<(String, String), String>);

impl OrientationMap {
    fn new(sources: &[ResolvedSource]) -> Self {
        Self(
            sources
                .iter()
                .map(|s| ((s.country.to_uppercase(), s.source.to_lowercase()), s.orientation.clone()))
                .collect(),
        )
    }

    fn get(&self, country: &str, source: &str) -> Option<&str> {
        self.0
            .get(&(country.to_uppercase(), source.to_lowercase()))
            .map(String::as_str)
    }
}

struct FramePrompt<'a> {
    event_signature: &'a str,
    country: &'a str,
    target: &'a ExtractionTarget,
    orientation_inherited: Option<&'a str>,
    body: &'a ComposedText,
}

impl FramePrompt<'_> {
    fn render(&self) -> String {
        [
            format!("Event signature: {}", self.event_signature),
            format!("Country: {}", self.country),
            format!("Source: {} ({})", self.target.source, self.target.domain),
            format!("Orientation inherited: {}", self.orientation_inherited.unwrap_or("not available")),
            format!("Content completeness: {}", if self.body.partial { "partial" } else { "complete" }),
            String::new(),
            "Title:".to_string(),
            self.target.title.trim().to_string(),
            String::new(),
            "Snippet:".to_string(),
            self.target.snippet.trim().to_string(),
            String::new(),
            "Content to analyse:".to_string(),
            self.body.text.trim().to_string(),
        ]
        .join("\n")
    }
}

/// Build a frame card from the model reply. `partial` always comes from
/// extraction; the reply's own flag is only checked for type.
fn parse_frame_card(
    payload: &Map<String, Value>,
    orientation_inherited: Option<&str>,
    partial: bool,
) -> Result<FrameCard, ServiceError> {
    let key_claims = required_list(payload, "key_claims", false)?;
    if key_claims.is_empty() {
        return Err(ServiceError::schema("model response missing key_claims"));
    }
    optional_bool(payload, "partial")?;

    Ok(FrameCard {
        tone: required_str(payload, "tone")?,
        stance: required_str(payload, "stance")?,
        frame_label: required_str(payload, "frame_label")?,
        key_claims,
        evidence_level: required_str(payload, "evidence_level")?,
        orientation_inherited: orientation_inherited
            .map(str::to_string)
            .or_else(|| optional_str(payload, "orientation_inherited")),
        orientation_detected: optional_str(payload, "orientation_detected"),
        partial,
    })
}

/// Extract every search hit and produce one frame per hit, grouped by
/// country in request order.
pub async fn analyze_frames(
    llm: &dyn LlmProvider,
    engine: &dyn ExtractionEngine,
    concurrency: usize,
    request: &FramesAnalyzeRequest,
) -> Result<FramesAnalyzeResponse, ServiceError> {
    let event_signature = request.event_signature.trim();
    if event_signature.is_empty() {
        return Err(ServiceError::invalid("Event signature is required"));
    }

    let orientations = OrientationMap::new(&request.resolved_sources);
    let groups: Vec<TargetGroup> = request
        .per_country_results
        .iter()
        .map(|block| TargetGroup {
            key: block.country.clone(),
            targets: block
                .items
                .iter()
                .map(|item| ExtractionTarget {
                    url: item.url.clone(),
                    source: item.source.clone(),
                    domain: item.domain.clone(),
                    title: item.title.clone(),
                    snippet: item.snippet.clone(),
                })
                .collect(),
        })
        .collect();

    let countries: Vec<&str> = groups
        .iter()
        .flat_map(|g| std::iter::repeat(g.key.as_str()).take(g.targets.len()))
        .collect();
    let targets: Vec<ExtractionTarget> = groups.iter().flat_map(|g| g.targets.iter().cloned()).collect();
    info!(
        event_signature,
        countries = groups.len(),
        targets = targets.len(),
        "frames: analysis started"
    );

    let frames = run_batch(engine, &targets, concurrency, |index, target, outcome| {
        let country = countries[index].to_string();
        let orientation = orientations.get(&country, &target.source).map(str::to_string);
        frame_for_target(llm, event_signature, country, orientation, target, outcome)
    })
    .await?;

    let frames = aggregate(&groups, frames)?.into_flat();
    let partial = frames.iter().filter(|f| f.frame_card.partial).count();
    info!(frames = frames.len(), partial, "frames: analysis complete");

    Ok(FramesAnalyzeResponse { event_signature: event_signature.to_string(), frames })
}

async fn frame_for_target(
    llm: &dyn LlmProvider,
    event_signature: &str,
    country: String,
    orientation_inherited: Option<String>,
    target: ExtractionTarget,
    outcome: ExtractionOutcome,
) -> Result<ArticleFrame, ServiceError> {
    let body = compose(&target, &outcome);
    let prompt = FramePrompt {
        event_signature,
        country: &country,
        target: &target,
        orientation_inherited: orientation_inherited.as_deref(),
        body: &body,
    }
    .render();

    let payload = generate_structured(
        llm,
        LlmRequest {
            system: Some(SYSTEM_PROMPT.to_string()),
            prompt,
            response_schema: Some(response_schema()),
            ..Default::default()
        },
    )
    .await?;

    let frame_card = parse_frame_card(&payload, orientation_inherited.as_deref(), body.partial)?;
    let extracted_text = match outcome {
        ExtractionOutcome::Success { text } if !body.partial => Some(text),
        _ => None,
    };

    Ok(ArticleFrame {
        country,
        source: target.source,
        domain: target.domain,
        url: target.url,
        title: target.title,
        snippet: target.snippet,
        extracted_text,
        frame_card,
    })
}
