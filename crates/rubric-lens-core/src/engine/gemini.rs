//! HTTP evaluation engine for the Gemini `generateContent` API.
//!
//! Key points of the wire format:
//! - auth via the `x-goog-api-key` header (the key never appears in URLs or logs)
//! - raster artifacts travel as an `inline_data` part (base64 payload, no URI prefix)
//! - text artifacts travel as a plain `text` part after the instructions
//! - JSON response mode with a response schema, so the reply is a bare array

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::request::EvaluationRequest;
use super::{EngineError, EvaluationEngine, RawReply};
use crate::config::{ConfigError, EngineConfig};
use crate::encoder::EncodedArtifact;

/// Gemini-backed [`EvaluationEngine`].
pub struct GeminiEngine {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GeminiEngine {
    /// Build an engine from config. Fails when no API key is configured.
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        let api_key = config.require_api_key()?.to_string();
        let client = Client::builder()
            .user_agent(concat!("rubric-lens/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn endpoint_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// JSON body for one request.
    pub(crate) fn build_request_body(&self, request: &EvaluationRequest) -> Value {
        let artifact_part = match &request.artifact {
            EncodedArtifact::DataUri { media_type, .. } => json!({
                "inline_data": {
                    "mime_type": media_type,
                    "data": request.artifact.base64_payload().unwrap_or_default(),
                }
            }),
            EncodedArtifact::Text { text, .. } => json!({ "text": text }),
        };

        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": request.prompt() },
                    artifact_part,
                ]
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "responseMimeType": "application/json",
                "responseSchema": EvaluationRequest::response_schema(),
            }
        })
    }

    /// Pull the reply text out of a `generateContent` response body.
    pub(crate) fn parse_response(body: &Value) -> Result<RawReply, EngineError> {
        if let Some(reason) = body
            .pointer("/promptFeedback/blockReason")
            .and_then(|v| v.as_str())
        {
            return Err(EngineError::MalformedReply(format!(
                "prompt blocked by engine: {}",
                reason
            )));
        }

        let parts = body
            .pointer("/candidates/0/content/parts")
            .and_then(|p| p.as_array())
            .ok_or_else(|| {
                EngineError::MalformedReply("missing candidates[0].content.parts".to_string())
            })?;

        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect();

        if text.trim().is_empty() {
            return Err(EngineError::MalformedReply(
                "reply contained no text".to_string(),
            ));
        }

        Ok(RawReply {
            text,
            model: body
                .get("modelVersion")
                .and_then(|m| m.as_str())
                .map(str::to_string),
        })
    }
}

#[async_trait]
impl EvaluationEngine for GeminiEngine {
    async fn submit(&self, request: &EvaluationRequest) -> Result<RawReply, EngineError> {
        let body = self.build_request_body(request);
        let url = self.endpoint_url();

        debug!(
            attempt_id = %request.attempt_id,
            model = %self.model,
            url = %url,
            criteria = request.rubric.len(),
            "sending evaluation request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let body_text = response.text().await?;

        if !status.is_success() {
            return Err(EngineError::from_status(status.as_u16(), body_text));
        }

        let response_json: Value = serde_json::from_str(&body_text)
            .map_err(|e| EngineError::MalformedReply(format!("invalid JSON body: {}", e)))?;

        Self::parse_response(&response_json)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MaxScore, Rubric, RubricCriterion};
    use crate::encoder::encode_bytes;
    use uuid::Uuid;

    fn engine() -> GeminiEngine {
        let config = EngineConfig::new("http://localhost:1", "test-model").with_api_key("k");
        GeminiEngine::new(&config).unwrap()
    }

    fn request(media_type: &str, bytes: &[u8]) -> EvaluationRequest {
        let rubric = Rubric::from_criteria(vec![RubricCriterion::new(
            "1",
            "Clarity",
            MaxScore::default(),
        )])
        .unwrap();
        EvaluationRequest::new(Uuid::new_v4(), encode_bytes(media_type, bytes), rubric)
    }

    #[test]
    fn test_new_without_key_fails() {
        let config = EngineConfig::new("http://localhost:1", "m");
        assert!(matches!(
            GeminiEngine::new(&config),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            engine().endpoint_url(),
            "http://localhost:1/models/test-model:generateContent"
        );
    }

    #[test]
    fn test_raster_body_uses_inline_data_without_prefix() {
        let body = engine().build_request_body(&request("image/png", &[0, 1, 2]));
        let part = &body["contents"][0]["parts"][1]["inline_data"];
        assert_eq!(part["mime_type"], "image/png");
        assert_eq!(part["data"], "AAEC");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_text_body_appends_document() {
        let body = engine().build_request_body(&request("text/markdown", b"# Essay"));
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts[0]["text"].as_str().unwrap().contains("Clarity"));
        assert_eq!(parts[1]["text"], "# Essay");
    }

    #[test]
    fn test_parse_response_concatenates_parts() {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "[{\"criteriaId\""}, {"text": ":\"1\"}]"}]}}],
            "modelVersion": "test-model-001"
        });
        let reply = GeminiEngine::parse_response(&body).unwrap();
        assert_eq!(reply.text, "[{\"criteriaId\":\"1\"}]");
        assert_eq!(reply.model.as_deref(), Some("test-model-001"));
    }

    #[test]
    fn test_parse_response_errors() {
        assert!(matches!(
            GeminiEngine::parse_response(&json!({"candidates": []})),
            Err(EngineError::MalformedReply(_))
        ));
        assert!(matches!(
            GeminiEngine::parse_response(&json!({"promptFeedback": {"blockReason": "SAFETY"}})),
            Err(EngineError::MalformedReply(m)) if m.contains("SAFETY")
        ));
        assert!(matches!(
            GeminiEngine::parse_response(
                &json!({"candidates": [{"content": {"parts": [{"text": "  "}]}}]})
            ),
            Err(EngineError::MalformedReply(_))
        ));
    }
}
