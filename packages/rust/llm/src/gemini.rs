//! Gemini `generateContent` client.
//!
//! `POST {base_url}/v1beta/models/{model}:generateContent` with the key in
//! the `x-goog-api-key` header and `responseMimeType: application/json`.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use vcscout_shared::GeminiConfig;

use crate::{ModelError, TextModel};

/// `@type` suffix of the error detail carrying the suggested retry delay.
const RETRY_INFO_TYPE: &str = "google.rpc.RetryInfo";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

impl<'a> GenerateRequest<'a> {
    fn json_prompt(prompt: &'a str) -> Self {
        Self {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// `{"error": {...}}` envelope returned on failures.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> Result<String, ModelError> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(ModelError::EmptyResponse {
                reason: block_reason,
            });
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ModelError::EmptyResponse {
                reason: candidate.finish_reason.or(block_reason),
            });
        }

        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Gemini model client. Cheap to share; the HTTP client is built once.
#[derive(Debug, Clone)]
pub struct GeminiModel {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiModel {
    /// Build a client from the `[gemini]` config section.
    ///
    /// No request timeout is set; the provider's own limits apply.
    pub fn new(config: &GeminiConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .user_agent(concat!("vcscout/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

impl TextModel for GeminiModel {
    fn name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, prompt_chars = prompt.chars().count()))]
    async fn generate_json(&self, api_key: &str, prompt: &str) -> Result<String, ModelError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&GenerateRequest::json_prompt(prompt))
            .send()
            .await?;

        let status = response.status();
        let retry_after_header = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_failure(status.as_u16(), &body, retry_after_header);
            warn!(status = status.as_u16(), error = %err, "model call failed");
            return Err(err);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Decode(e.to_string()))?;

        let text = body.into_text()?;
        debug!(response_chars = text.chars().count(), "model responded");
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

/// Turn a non-2xx answer into a [`ModelError`].
fn classify_failure(status: u16, body: &str, retry_after_header: Option<Duration>) -> ModelError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();

    let message = envelope
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(200).collect());

    let exhausted = envelope
        .as_ref()
        .is_some_and(|e| e.error.status == "RESOURCE_EXHAUSTED");

    if status == 429 || exhausted {
        let retry_after = envelope
            .as_ref()
            .and_then(|e| retry_delay_from_details(&e.error.details))
            .or(retry_after_header);
        return ModelError::RateLimited {
            message,
            retry_after,
        };
    }

    ModelError::Api { status, message }
}

/// Find `RetryInfo.retryDelay` among the error details.
fn retry_delay_from_details(details: &[serde_json::Value]) -> Option<Duration> {
    details
        .iter()
        .filter(|d| {
            d.get("@type")
                .and_then(|t| t.as_str())
                .is_some_and(|t| t.ends_with(RETRY_INFO_TYPE))
        })
        .find_map(|d| d.get("retryDelay").and_then(|v| v.as_str()))
        .and_then(parse_protobuf_duration)
}

/// Parse a protobuf JSON duration such as `"37s"` or `"1.5s"`.
///
/// Negative, non-finite and out-of-range values yield `None`.
fn parse_protobuf_duration(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().strip_suffix('s')?.parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENDPOINT: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

    fn model_for(server: &MockServer) -> GeminiModel {
        GeminiModel::new(&GeminiConfig {
            base_url: format!("{}/", server.uri()),
            ..GeminiConfig::default()
        })
        .unwrap()
    }

    fn candidate_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        })
    }

    #[test]
    fn request_serializes_json_mode() {
        let json = serde_json::to_value(GenerateRequest::json_prompt("hello")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
                "generationConfig": {"responseMimeType": "application/json"}
            })
        );
    }

    #[test]
    fn parses_protobuf_durations() {
        assert_eq!(parse_protobuf_duration("37s"), Some(Duration::from_secs(37)));
        assert_eq!(
            parse_protobuf_duration("1.5s"),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(parse_protobuf_duration("37"), None);
        assert_eq!(parse_protobuf_duration("-3s"), None);
        assert_eq!(parse_protobuf_duration("soon"), None);
        assert_eq!(parse_protobuf_duration("1e30s"), None);
        assert_eq!(parse_protobuf_duration("NaNs"), None);
        assert_eq!(parse_protobuf_duration("infs"), None);
    }

    #[test]
    fn classify_non_json_body_keeps_raw_text() {
        let err = classify_failure(502, "Bad Gateway", None);
        match err {
            ModelError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn classify_resource_exhausted_without_429() {
        let body = r#"{"error":{"code":403,"message":"quota","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(classify_failure(403, body, None).is_rate_limited());
    }

    #[tokio::test]
    async fn returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body(r#"{"a":1}"#)))
            .expect(1)
            .mount(&server)
            .await;

        let text = model_for(&server)
            .generate_json("test-key", "prompt")
            .await
            .unwrap();
        assert_eq!(text, r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn joins_multiple_parts() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let text = model_for(&server).generate_json("k", "p").await.unwrap();
        assert_eq!(text, r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn rate_limit_uses_retry_info() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "error": {
                "code": 429,
                "message": "Resource has been exhausted (e.g. check quota).",
                "status": "RESOURCE_EXHAUSTED",
                "details": [
                    {"@type": "type.googleapis.com/google.rpc.QuotaFailure", "violations": []},
                    {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "37s"}
                ]
            }
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(body))
            .mount(&server)
            .await;

        let err = model_for(&server).generate_json("k", "p").await.unwrap_err();
        match err {
            ModelError::RateLimited {
                message,
                retry_after,
            } => {
                assert!(message.contains("exhausted"));
                assert_eq!(retry_after, Some(Duration::from_secs(37)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_retry_delay_falls_back_to_header() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "error": {
                "code": 429,
                "message": "Resource has been exhausted (e.g. check quota).",
                "status": "RESOURCE_EXHAUSTED",
                "details": [
                    {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "1e30s"}
                ]
            }
        });
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(body.clone())
                    .insert_header("retry-after", "5"),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(body))
            .mount(&server)
            .await;

        let model = model_for(&server);

        let err = model.generate_json("k", "p").await.unwrap_err();
        assert!(matches!(
            err,
            ModelError::RateLimited { retry_after: Some(d), .. } if d == Duration::from_secs(5)
        ));

        let err = model.generate_json("k", "p").await.unwrap_err();
        assert!(matches!(
            err,
            ModelError::RateLimited {
                retry_after: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn rate_limit_falls_back_to_retry_after_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
            .mount(&server)
            .await;

        let err = model_for(&server).generate_json("k", "p").await.unwrap_err();
        assert!(matches!(
            err,
            ModelError::RateLimited { retry_after: Some(d), .. } if d == Duration::from_secs(12)
        ));
    }

    #[tokio::test]
    async fn rate_limit_without_hint_has_no_delay() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = model_for(&server).generate_json("k", "p").await.unwrap_err();
        assert!(matches!(
            err,
            ModelError::RateLimited {
                retry_after: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn server_error_maps_to_api_error() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(body))
            .mount(&server)
            .await;

        let err = model_for(&server).generate_json("k", "p").await.unwrap_err();
        match err {
            ModelError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid.");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blocked_prompt_is_empty_response() {
        let server = MockServer::start().await;
        let body = serde_json::json!({"promptFeedback": {"blockReason": "SAFETY"}});
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let err = model_for(&server).generate_json("k", "p").await.unwrap_err();
        assert!(matches!(
            err,
            ModelError::EmptyResponse { reason: Some(ref r) } if r == "SAFETY"
        ));
    }
}
