use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, State, rejection::JsonRejection},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info_span, warn};

use vcscout_core::EnrichmentPipeline;
use vcscout_llm::TextModel;
use vcscout_shared::{EnrichmentRequest, EnrichmentResult, ScoutError};

use crate::middleware::{REQUEST_ID_HEADER, RequestId, request_id};

const QUOTA_ERROR: &str = "AI Quota Exceeded (429)";
const QUOTA_DETAILS: &str = "The free-tier API limit has been reached. Please wait a minute and \
     try again, or check your API key quota.";
const PIPELINE_ERROR: &str = "Failed to process enrichment.";

/// Shared handler state: one pipeline for every request.
pub struct AppState<M> {
    pub pipeline: Arc<EnrichmentPipeline<M>>,
}

impl<M> AppState<M> {
    pub fn new(pipeline: EnrichmentPipeline<M>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

impl<M> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

// ---------------------------------------------------------------------------
// Error responses
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ErrorMeta>,
}

#[derive(Debug, Serialize)]
pub struct ErrorMeta {
    #[serde(rename = "retryAfter")]
    pub retry_after: String,
}

/// An error rendered as a JSON body with a matching status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
    /// Seconds for the `Retry-After` header.
    pub retry_after: Option<u64>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                code,
                details: None,
                stack: None,
                meta: None,
            },
            retry_after: None,
        }
    }
}

impl From<ScoutError> for ApiError {
    fn from(err: ScoutError) -> Self {
        let code = err.code();
        match err {
            ScoutError::Config { message } | ScoutError::Validation { message } => {
                warn!(code, %message, "enrichment request rejected");
                Self::new(StatusCode::BAD_REQUEST, code, message)
            }
            ScoutError::Extraction { message } => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, message)
            }
            ScoutError::QuotaExceeded { retry_after_secs } => {
                let mut api = Self::new(StatusCode::TOO_MANY_REQUESTS, code, QUOTA_ERROR);
                api.body.details = Some(QUOTA_DETAILS.to_string());
                api.body.meta = Some(ErrorMeta {
                    retry_after: format!("{retry_after_secs}s"),
                });
                api.retry_after = Some(retry_after_secs);
                api
            }
            ScoutError::Pipeline { message, detail } => {
                error!(%message, "enrichment failed");
                let mut api = Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, PIPELINE_ERROR);
                api.body.details = Some(message);
                api.body.stack = detail;
                api
            }
            other => {
                error!(error = %other, "enrichment failed");
                let mut api = Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, PIPELINE_ERROR);
                api.body.details = Some(other.to_string());
                api
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection.body_text(), "malformed request body");
        Self::new(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, REQUEST_ID_HEADER.clone()])
}

pub fn build_app<M: TextModel + 'static>(state: AppState<M>) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request| {
        let id = req
            .extensions()
            .get::<RequestId>()
            .map_or("-", |r| r.0.as_str());
        info_span!("http", method = %req.method(), uri = %req.uri(), request_id = %id)
    });

    Router::new()
        .route("/health", get(health))
        .route("/api/enrich", post(enrich::<M>))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id))
                .layer(trace)
                .layer(build_cors()),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
}

async fn health() -> Json<HealthData> {
    Json(HealthData { status: "ok" })
}

async fn enrich<M: TextModel + 'static>(
    State(state): State<AppState<M>>,
    payload: Result<Json<EnrichmentRequest>, JsonRejection>,
) -> Result<Json<EnrichmentResult>, ApiError> {
    let Json(request) = payload?;
    let url = request.url.unwrap_or_default();

    let result = state.pipeline.enrich(&request.company_id, &url).await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;
    use vcscout_core::PipelineSettings;
    use vcscout_fetch::PageFetcher;
    use vcscout_llm::ModelError;
    use vcscout_shared::{Environment, FetchConfig};

    use super::*;

    /// Guarded host: the fetch is refused before any I/O, so every request
    /// runs on the scrape placeholder.
    const BLOCKED_URL: &str = "http://localhost/";

    #[derive(Clone, Copy)]
    enum Reply {
        Text(&'static str),
        RateLimited(Option<Duration>),
        Api,
    }

    struct FixedModel(Reply);

    impl TextModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate_json(&self, _api_key: &str, _prompt: &str) -> Result<String, ModelError> {
            match self.0 {
                Reply::Text(text) => Ok(text.to_string()),
                Reply::RateLimited(retry_after) => Err(ModelError::RateLimited {
                    message: "Resource has been exhausted".into(),
                    retry_after,
                }),
                Reply::Api => Err(ModelError::Api {
                    status: 500,
                    message: "backend error".into(),
                }),
            }
        }
    }

    fn app(reply: Reply, api_key: Option<&str>, environment: Environment) -> Router {
        let fetcher = PageFetcher::new(&FetchConfig::default()).expect("fetcher");
        let pipeline = EnrichmentPipeline::new(
            fetcher,
            FixedModel(reply),
            api_key.map(str::to_string),
            PipelineSettings {
                max_chars: 10_000,
                environment,
                credential_name: "GEMINI_API_KEY".into(),
            },
        );
        build_app(AppState::new(pipeline))
    }

    fn ok_app() -> Router {
        app(
            Reply::Text(r#"{"summary":"A","whatTheyDo":["B"],"keywords":["C"],"signals":["D"]}"#),
            Some("key"),
            Environment::Development,
        )
    }

    fn enrich_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/enrich")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json parse")
    }

    #[tokio::test]
    async fn health_reports_ok_with_request_id() {
        let response = ok_app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let id = response
            .headers()
            .get("x-request-id")
            .expect("request id header")
            .to_str()
            .expect("ascii");
        assert_eq!(uuid::Uuid::parse_str(id).expect("uuid").get_version_num(), 7);
        assert_eq!(json_body(response).await, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn incoming_request_id_is_echoed() {
        let response = ok_app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("x-request-id", "trace-123")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.headers()["x-request-id"], "trace-123");
    }

    #[tokio::test]
    async fn enrich_returns_result() {
        let body = format!(r#"{{"companyId":"co1","url":"{BLOCKED_URL}"}}"#);
        let response = ok_app()
            .oneshot(enrich_request(&body))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["companyId"], "co1");
        assert_eq!(json["summary"], "A");
        assert_eq!(json["whatTheyDo"], serde_json::json!(["B"]));
        assert_eq!(json["sources"][0]["url"], BLOCKED_URL);
        assert!(json["sources"][0]["timestamp"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn missing_url_is_bad_request() {
        let response = ok_app()
            .oneshot(enrich_request(r#"{"companyId":"co1"}"#))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"], "URL is required");
        assert_eq!(json["code"], "validation_error");
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let response = ok_app()
            .oneshot(enrich_request("{not json"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "bad_request");
    }

    #[tokio::test]
    async fn missing_credential_is_configuration_error() {
        let response = app(Reply::Api, None, Environment::Development)
            .oneshot(enrich_request(r#"{"companyId":"co1","url":"https://example.com"}"#))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["code"], "configuration_error");
        assert!(json["error"].as_str().unwrap().contains("GEMINI_API_KEY"));
    }

    #[tokio::test]
    async fn invalid_model_answer_is_extraction_error() {
        let body = format!(r#"{{"companyId":"co1","url":"{BLOCKED_URL}"}}"#);
        let response = app(Reply::Text("not json"), Some("key"), Environment::Development)
            .oneshot(enrich_request(&body))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["error"], "Intelligence extraction failed: Invalid format.");
        assert_eq!(json["code"], "extraction_error");
    }

    #[tokio::test]
    async fn quota_sets_retry_after() {
        let body = format!(r#"{{"companyId":"co1","url":"{BLOCKED_URL}"}}"#);
        let response = app(
            Reply::RateLimited(Some(Duration::from_secs(37))),
            Some("key"),
            Environment::Development,
        )
        .oneshot(enrich_request(&body))
        .await
        .expect("response");

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "37");
        let json = json_body(response).await;
        assert_eq!(json["error"], "AI Quota Exceeded (429)");
        assert_eq!(json["code"], "quota_exceeded");
        assert_eq!(json["meta"]["retryAfter"], "37s");
        assert!(json["details"].is_string());
    }

    #[tokio::test]
    async fn quota_defaults_to_sixty_seconds() {
        let body = format!(r#"{{"companyId":"co1","url":"{BLOCKED_URL}"}}"#);
        let response = app(Reply::RateLimited(None), Some("key"), Environment::Production)
            .oneshot(enrich_request(&body))
            .await
            .expect("response");

        assert_eq!(response.headers()[header::RETRY_AFTER], "60");
        assert_eq!(json_body(response).await["meta"]["retryAfter"], "60s");
    }

    #[tokio::test]
    async fn pipeline_error_exposes_stack_only_in_development() {
        let body = format!(r#"{{"companyId":"co1","url":"{BLOCKED_URL}"}}"#);

        let response = app(Reply::Api, Some("key"), Environment::Development)
            .oneshot(enrich_request(&body))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["error"], "Failed to process enrichment.");
        assert_eq!(json["code"], "pipeline_error");
        assert!(json["details"].as_str().unwrap().contains("backend error"));
        assert!(json["stack"].is_string());

        let response = app(Reply::Api, Some("key"), Environment::Production)
            .oneshot(enrich_request(&body))
            .await
            .expect("response");
        assert!(json_body(response).await.get("stack").is_none());
    }
}
