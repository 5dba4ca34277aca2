//! Google Gemini `generateContent` backend.
//!
//! One HTTP call per [`TextModel::complete`]. Retry and throttling are the
//! generation client's job, not this module's.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LlmError, ModelConnector, TextModel};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Finish reasons that mean the model stopped on its own.
const NORMAL_FINISH_REASONS: &[&str] = &["STOP", "MAX_TOKENS", "FINISH_REASON_UNSPECIFIED"];

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, or the reason there is none.
    ///
    /// An empty candidate stopped for anything other than a normal finish
    /// (`SAFETY`, `RECITATION`, ...) is reported as [`LlmError::Blocked`].
    pub fn into_text(self) -> Result<String, LlmError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LlmError::Blocked(reason));
        }

        let candidate = self.candidates.into_iter().next();
        let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());
        let text: String = candidate
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(match finish_reason {
                Some(reason) if !NORMAL_FINISH_REASONS.contains(&reason.as_str()) => {
                    LlmError::Blocked(reason)
                }
                _ => LlmError::EmptyContent,
            });
        }
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    details: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    reason: Option<String>,
}

/// Maps a non-success HTTP response to an [`LlmError`].
/// Credential rejections get their own variant so they are never retried.
fn classify_error(status: u16, body: &str) -> LlmError {
    let parsed = serde_json::from_str::<ApiErrorEnvelope>(body).ok();
    let key_invalid = parsed.as_ref().is_some_and(|e| {
        e.error
            .details
            .iter()
            .any(|d| d.reason.as_deref() == Some("API_KEY_INVALID"))
    });
    let message = parsed
        .map(|e| e.error.message)
        .unwrap_or_else(|| body.to_string());

    if status == 401 || status == 403 || key_invalid {
        LlmError::Credential(message)
    } else {
        LlmError::Api { status, message }
    }
}

/// Builds [`GeminiModel`]s that share one HTTP connection pool.
#[derive(Clone)]
pub struct GeminiConnector {
    client: Client,
    base_url: String,
}

impl GeminiConnector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl ModelConnector for GeminiConnector {
    fn connect(&self, model: &str, api_key: &str) -> Arc<dyn TextModel> {
        Arc::new(GeminiModel {
            client: self.client.clone(),
            endpoint: format!("{}/models/{}:generateContent", self.base_url, model),
            api_key: api_key.to_string(),
        })
    }
}

/// A Gemini model bound to one credential.
pub struct GeminiModel {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[async_trait]
impl TextModel for GeminiModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &text));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                "Gemini call succeeded: prompt_tokens={}, output_tokens={}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }
        parsed.into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_text_concatenates_parts_of_first_candidate() {
        let response = parse(serde_json::json!({
            "candidates": [
                {"content": {"parts": [{"text": "Hello, "}, {"text": "world"}]}, "finishReason": "STOP"},
                {"content": {"parts": [{"text": "ignored"}]}}
            ],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3}
        }));
        assert_eq!(response.into_text().unwrap(), "Hello, world");
    }

    #[test]
    fn test_whitespace_only_text_is_empty_content() {
        let response = parse(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "  \n "}]}}]
        }));
        assert!(matches!(response.into_text(), Err(LlmError::EmptyContent)));
    }

    #[test]
    fn test_missing_candidates_is_empty_content() {
        let response = parse(serde_json::json!({}));
        assert!(matches!(response.into_text(), Err(LlmError::EmptyContent)));
    }

    #[test]
    fn test_blocked_prompt_reports_reason() {
        let response = parse(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }));
        match response.into_text() {
            Err(LlmError::Blocked(reason)) => assert_eq!(reason, "SAFETY"),
            other => panic!("expected Blocked, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_candidate_stopped_for_safety_is_blocked() {
        let response = parse(serde_json::json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }));
        match response.into_text() {
            Err(LlmError::Blocked(reason)) => assert_eq!(reason, "SAFETY"),
            other => panic!("expected Blocked, got {other:?}"),
        }

        let recitation = parse(serde_json::json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "RECITATION"}]
        }));
        assert!(matches!(recitation.into_text(), Err(LlmError::Blocked(r)) if r == "RECITATION"));
    }

    #[test]
    fn test_empty_candidate_with_normal_finish_is_empty_content() {
        let response = parse(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": ""}]}, "finishReason": "STOP"}]
        }));
        assert!(matches!(response.into_text(), Err(LlmError::EmptyContent)));
    }

    #[test]
    fn test_invalid_key_reason_is_credential_error() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.",
            "status": "INVALID_ARGUMENT", "details": [{"reason": "API_KEY_INVALID"}]}}"#;
        match classify_error(400, body) {
            LlmError::Credential(msg) => assert!(msg.starts_with("API key not valid")),
            other => panic!("expected Credential, got {other:?}"),
        }
    }

    #[test]
    fn test_forbidden_is_credential_error() {
        assert!(matches!(
            classify_error(403, "forbidden"),
            LlmError::Credential(_)
        ));
    }

    #[test]
    fn test_server_error_keeps_status_and_message() {
        let body = r#"{"error": {"code": 503, "message": "The model is overloaded."}}"#;
        match classify_error(503, body) {
            LlmError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "The model is overloaded.");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_error_body_is_kept_verbatim() {
        match classify_error(500, "upstream exploded") {
            LlmError::Api { message, .. } => assert_eq!(message, "upstream exploded"),
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn test_connector_trims_trailing_slash() {
        let connector = GeminiConnector::new("http://localhost:9999/v1beta/");
        assert_eq!(connector.base_url, "http://localhost:9999/v1beta");
    }
}
