use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ServiceError;

pub mod payload;
pub mod remote;

/// Core trait for LLM providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate completion for a given prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;
}

/// Request structure for LLM generation
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub prompt: String,
    /// Ask the vendor to constrain the reply to this schema
    pub response_schema: Option<JsonSchema>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

/// Named JSON schema, serialized as the `json_schema` response format
#[derive(Debug, Clone, Serialize)]
pub struct JsonSchema {
    pub name: String,
    pub schema: Value,
    pub strict: bool,
}

impl JsonSchema {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self { name: name.into(), schema, strict: false }
    }
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Send a schema-constrained request and return the reply as a JSON object.
///
/// Transport and vendor failures map to [`ServiceError::Upstream`]; a reply
/// that is not a JSON object maps to [`ServiceError::SchemaViolation`].
pub async fn generate_structured<P: LlmProvider + ?Sized>(
    provider: &P,
    request: LlmRequest,
) -> Result<serde_json::Map<String, Value>, ServiceError> {
    let schema_name = request
        .response_schema
        .as_ref()
        .map(|s| s.name.clone())
        .unwrap_or_default();

    let response = provider.generate(request).await?;
    debug!(
        schema = %schema_name,
        model = %response.model,
        total_tokens = response.usage.total_tokens,
        "structured generation completed"
    );

    let cleaned = extract_json_from_text(&response.content)
        .ok_or_else(|| ServiceError::schema("no JSON object found in model response"))?;

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ServiceError::schema("model response payload was not a JSON object")),
        Err(e) => Err(ServiceError::schema(format!("invalid JSON in model response: {}", e))),
    }
}

/// Helper to extract JSON from text that might contain markdown backticks or preamble
pub fn extract_json_from_text(text: &str) -> Option<String> {
    // 1. Try to find content between ```json and ```
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    // 2. Try to find content between ``` and ```
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    // 3. Try to find the first '{' and last '}'
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return Some(text[start..=end].to_string());
        }
    }

    None
}


#[cfg(test)]
mod tests {
    use super::testing::StaticLlm;
    use super::*;

    #[test]
    fn extracts_fenced_json() {
        let text = "Here you go:\n```json\n{\"tone\": \"neutral\"}\n```";
        assert_eq!(extract_json_from_text(text).unwrap(), "{\"tone\": \"neutral\"}");
    }

    #[test]
    fn extracts_braced_json_with_preamble() {
        let text = "Sure! {\"a\": {\"b\": 1}} hope this helps";
        assert_eq!(extract_json_from_text(text).unwrap(), "{\"a\": {\"b\": 1}}");
        assert!(extract_json_from_text("no json here").is_none());
    }

    #[tokio::test]
    async fn structured_generation_rejects_non_json() {
        let llm = StaticLlm::text("I cannot help with that.");
        let err = generate_structured(&llm, LlmRequest::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn structured_generation_rejects_broken_json() {
        let llm = StaticLlm::text("{\"tone\": }");
        let err = generate_structured(&llm, LlmRequest::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn structured_generation_returns_object() {
        let llm = StaticLlm::json(serde_json::json!({"tone": "neutral"}));
        let map = generate_structured(&llm, LlmRequest::default()).await.unwrap();
        assert_eq!(map["tone"], "neutral");
    }
}
