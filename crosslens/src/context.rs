// Context builder: turns a free-text news query into structured event context.
use serde_json::json;
use tracing::info;

use crate::error::ServiceError;
use crate::llm::payload::{required_list, required_str};
use crate::llm::{generate_structured, JsonSchema, LlmProvider, LlmRequest};
use crate::models::{ContextBuildRequest, ContextBuildResponse};
use crate::normalize::normalize_query;

const SYSTEM_PROMPT: &str = "You prepare the starting context for CrossLens, a podcast comparing how \
international outlets cover the same news event. Reply only with JSON matching the supplied schema. \
Identify the nations involved (ISO-3166 alpha-3 codes), the people involved, the organisations \
involved, a high-level topic category and a concise event signature suitable for a news search. \
Use an empty list or empty string when information is unavailable. Do not add text outside the JSON.";

fn response_schema() -> JsonSchema {
    JsonSchema::new(
        "crosslens_context_schema",
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "nations_involved": {
                    "type": "array",
                    "items": { "type": "string", "pattern": "^[A-Z]{3}$" },
                    "description": "ISO-3166 alpha-3 country codes involved in the event"
                },
                "actors": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "People directly involved in the event"
                },
                "organizations": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Organisations or institutions involved"
                },
                "topic_category": {
                    "type": "string",
                    "description": "High level topic classification for the news event"
                },
                "event_signature": {
                    "type": "string",
                    "description": "Short event signature to drive subsequent search"
                }
            },
            "required": ["nations_involved", "actors", "organizations", "topic_category", "event_signature"]
        }),
    )
}

/// Normalise the query and ask the model for structured event context.
pub async fn build_context(
    llm: &dyn LlmProvider,
    request: &ContextBuildRequest,
) -> Result<ContextBuildResponse, ServiceError> {
    let normalized_query = normalize_query(&request.query)?;

    let payload = generate_structured(
        llm,
        LlmRequest {
            system: Some(SYSTEM_PROMPT.to_string()),
            prompt: normalized_query.clone(),
            response_schema: Some(response_schema()),
            ..Default::default()
        },
    )
    .await?;

    let response = ContextBuildResponse {
        nations_involved: required_list(&payload, "nations_involved", true)?,
        actors: required_list(&payload, "actors", false)?,
        organizations: required_list(&payload, "organizations", false)?,
        topic_category: required_str(&payload, "topic_category")?,
        event_signature: required_str(&payload, "event_signature")?,
        normalized_query,
    };

    info!(
        query = %response.normalized_query,
        nations = response.nations_involved.len(),
        signature = %response.event_signature,
        "context built"
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::StaticLlm;

    fn request(query: &str) -> ContextBuildRequest {
        ContextBuildRequest { query: query.to_string() }
    }

    #[tokio::test]
    async fn parses_payload() {
        let llm = StaticLlm::json(json!({
            "nations_involved": ["rus", "USA"],
            "actors": [" Vladimir Putin ", ""],
            "organizations": ["Kremlin"],
            "topic_category": "geopolitica",
            "event_signature": "Summit Putin-Trump su Ucraina"
        }));

        let result = build_context(&llm, &request("  Putin   e Trump su Ucraina ")).await.unwrap();

        assert_eq!(result.normalized_query, "Putin e Trump su Ucraina");
        assert_eq!(result.nations_involved, vec!["RUS", "USA"]);
        assert_eq!(result.actors, vec!["Vladimir Putin"]);
        assert_eq!(result.organizations, vec!["Kremlin"]);
        assert_eq!(result.event_signature, "Summit Putin-Trump su Ucraina");

        let sent = llm.requests.lock().unwrap();
        assert_eq!(sent[0].prompt, "Putin e Trump su Ucraina");
        assert!(sent[0].system.as_deref().unwrap().contains("alpha-3"));
        assert_eq!(sent[0].response_schema.as_ref().unwrap().name, "crosslens_context_schema");
    }

    #[tokio::test]
    async fn requires_topic_and_signature() {
        let llm = StaticLlm::json(json!({
            "nations_involved": [],
            "actors": [],
            "organizations": [],
            "topic_category": "",
            "event_signature": ""
        }));

        let err = build_context(&llm, &request("Event")).await.unwrap_err();
        assert!(matches!(err, ServiceError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn missing_list_is_schema_violation() {
        let llm = StaticLlm::json(json!({
            "nations_involved": ["ITA"],
            "organizations": [],
            "topic_category": "politica",
            "event_signature": "Crisi di governo"
        }));

        let err = build_context(&llm, &request("crisi")).await.unwrap_err();
        assert!(err.to_string().contains("actors"));
    }

    #[tokio::test]
    async fn empty_query_never_reaches_model() {
        let llm = StaticLlm::json(json!({}));
        let err = build_context(&llm, &request("   ")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(llm.requests.lock().unwrap().is_empty());
    }
}
