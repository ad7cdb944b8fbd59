use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

use super::{Audio, TtsProvider};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Gemini Flash TTS through the `generateContent` endpoint with audio modality.
pub struct GeminiTtsProvider {
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    generation_config: Option<Value>,
    client: reqwest::Client,
}

impl GeminiTtsProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: Duration::from_secs(120),
            generation_config: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_secs);
        self
    }

    /// Passed through verbatim as `generationConfig`.
    pub fn with_generation_config(mut self, config: Value) -> Self {
        self.generation_config = Some(config);
        self
    }


    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait::async_trait]
impl TtsProvider for GeminiTtsProvider {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Audio> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![TextPart { text }],
            }],
            modalities: vec!["AUDIO"],
            audio_config: AudioConfig { voice },
            generation_config: self.generation_config.as_ref(),
        };

        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(self.endpoint())
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
                .send(),
        )
        .await
        .context("TTS request timed out")?
        .context("TTS HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, model = %self.model, "TTS API returned an error");
            anyhow::bail!("TTS API error {}: {}", status, body);
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .context("TTS returned an unexpected response format")?;

        if let Some(error) = reply.error {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            warn!(model = %self.model, %message, "TTS API reported an error");
            anyhow::bail!("TTS returned an error: {}", message);
        }

        let inline = reply
            .candidates
            .into_iter()
            .flat_map(|c| c.content.map(|c| c.parts).unwrap_or_default())
            .filter_map(|p| p.inline_data)
            .find(|d| d.data.as_deref().is_some_and(|s| !s.is_empty()))
            .context("TTS response did not include audio data")?;

        let bytes = BASE64
            .decode(inline.data.unwrap_or_default())
            .context("TTS returned invalid audio data")?;
        let mime_type = inline.mime_type.unwrap_or_else(|| "application/octet-stream".to_string());

        info!(model = %self.model, voice, bytes = bytes.len(), %mime_type, "TTS audio received");
        Ok(Audio { bytes, mime_type })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    modalities: Vec<&'static str>,
    #[serde(rename = "audioConfig")]
    audio_config: AudioConfig<'a>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<&'a Value>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct AudioConfig<'a> {
    voice: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(rename = "inlineData", default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType", default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const PATH: &str = "/models/gemini-2.5-flash-preview-tts:generateContent";

    fn provider(server: &mockito::Server) -> GeminiTtsProvider {
        GeminiTtsProvider::new(server.url(), "secret", DEFAULT_MODEL)
    }

    #[tokio::test]
    async fn sends_voice_and_decodes_audio() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_query(Matcher::UrlEncoded("key".into(), "secret".into()))
            .match_body(Matcher::PartialJson(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "Ciao" }] }],
                "modalities": ["AUDIO"],
                "audioConfig": { "voice": "it-IT-Standard-A" },
                "generationConfig": { "temperature": 0.9 }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "candidates": [{
                        "content": { "parts": [
                            { "text": "ignored" },
                            { "inlineData": { "mimeType": "audio/mp3", "data": BASE64.encode(b"audio-bytes") } }
                        ]}
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let audio = provider(&server)
            .with_generation_config(json!({ "temperature": 0.9 }))
            .synthesize("Ciao", "it-IT-Standard-A")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(audio.bytes, b"audio-bytes");
        assert_eq!(audio.mime_type, "audio/mp3");
    }

    #[tokio::test]
    async fn missing_audio_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({ "candidates": [] }).to_string())
            .create_async()
            .await;

        let err = provider(&server).synthesize("Hello", "Kore").await.unwrap_err();
        assert!(err.to_string().contains("did not include audio"));
    }

    #[tokio::test]
    async fn http_error_is_propagated() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("Server error")
            .create_async()
            .await;

        let err = provider(&server).synthesize("Hello", "Kore").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn error_object_in_body_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({ "error": { "code": 400, "message": "voice not found" } }).to_string())
            .create_async()
            .await;

        let err = provider(&server).synthesize("Hello", "Nope").await.unwrap_err();
        assert!(err.to_string().contains("voice not found"));
    }

    #[tokio::test]
    async fn invalid_base64_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "candidates": [{ "content": { "parts": [
                        { "inlineData": { "mimeType": "audio/pcm", "data": "***not base64***" } }
                    ]}}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let err = provider(&server).synthesize("Hello", "Kore").await.unwrap_err();
        assert!(err.to_string().contains("invalid audio data"));
    }
}
