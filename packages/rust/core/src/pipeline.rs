//! End-to-end enrichment: URL → fetch → extract → prompt → model → result.

use std::time::Instant;

use tracing::{error, info, instrument, warn};

use vcscout_extract::extract_text;
use vcscout_fetch::PageFetcher;
use vcscout_llm::{ModelError, TextModel};
use vcscout_shared::{
    AppConfig, DEFAULT_RETRY_AFTER_SECS, EnrichmentResult, Environment, IntelligenceFields,
    MAX_CONTENT_CHARS, Result, ScoutError, SourceRef,
};

use crate::prompt::build_prompt;

/// Stand-in content sent to the model when the page could not be used.
pub const SCRAPE_PLACEHOLDER: &str =
    "Scrape failed or content blocked. Use general knowledge if possible.";

/// Message carried by [`ScoutError::Extraction`] when the model answer does
/// not decode.
pub const EXTRACTION_FAILED: &str = "Intelligence extraction failed: Invalid format.";

/// `M/D/YYYY, h:mm:ss AM|PM` in local time.
const TIMESTAMP_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Tunables for [`EnrichmentPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Character budget for extracted page text.
    pub max_chars: usize,
    /// Controls whether pipeline errors carry diagnostic detail.
    pub environment: Environment,
    /// Name of the credential, used in configuration errors.
    pub credential_name: String,
}

impl PipelineSettings {
    /// `max_chars` is clamped to [`MAX_CONTENT_CHARS`].
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_chars: config.fetch.max_chars.min(MAX_CONTENT_CHARS),
            environment: config.server.environment,
            credential_name: config.gemini.api_key_env.clone(),
        }
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
}

/// Stateless enrichment orchestrator. Safe to share across concurrent calls.
pub struct EnrichmentPipeline<M> {
    fetcher: PageFetcher,
    model: M,
    api_key: Option<String>,
    settings: PipelineSettings,
}

impl<M: TextModel> EnrichmentPipeline<M> {
    pub fn new(
        fetcher: PageFetcher,
        model: M,
        api_key: Option<String>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fetcher,
            model,
            api_key,
            settings,
        }
    }

    /// Build a pipeline from loaded config. `api_key` is usually
    /// [`vcscout_shared::resolve_api_key`].
    pub fn from_config(config: &AppConfig, api_key: Option<String>, model: M) -> Result<Self> {
        let fetcher = PageFetcher::new(&config.fetch)?;
        Ok(Self::new(
            fetcher,
            model,
            api_key,
            PipelineSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Produce an [`EnrichmentResult`] for one company website.
    pub async fn enrich(&self, company_id: &str, url: &str) -> Result<EnrichmentResult> {
        self.enrich_with_progress(company_id, url, &SilentProgress)
            .await
    }

    /// Like [`enrich`](Self::enrich), reporting each phase to `progress`.
    ///
    /// 1. Credential and URL checks (no I/O on failure)
    /// 2. Fetch and extract, degrading to [`SCRAPE_PLACEHOLDER`]
    /// 3. One model call in JSON mode
    /// 4. Decode and assemble
    #[instrument(skip_all, fields(company_id = %company_id, url = %url))]
    pub async fn enrich_with_progress(
        &self,
        company_id: &str,
        url: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<EnrichmentResult> {
        let start = Instant::now();

        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ScoutError::config(format!("{} is not configured", self.settings.credential_name))
            })?;

        if url.trim().is_empty() {
            return Err(ScoutError::validation("URL is required"));
        }

        progress.phase("Fetching page");
        let content = self.acquire_content(url).await;

        progress.phase("Analyzing");
        let prompt = build_prompt(url, &content);
        let raw = self
            .model
            .generate_json(api_key, &prompt)
            .await
            .map_err(|e| self.classify(e))?;

        progress.phase("Decoding");
        let fields: IntelligenceFields = serde_json::from_str(raw.trim()).map_err(|e| {
            error!(error = %e, raw = %raw, "model answer did not match the expected schema");
            ScoutError::extraction(EXTRACTION_FAILED)
        })?;

        let result = EnrichmentResult::assemble(
            company_id,
            fields,
            SourceRef {
                url: url.to_string(),
                timestamp: source_timestamp(),
            },
        );

        info!(
            model = self.model.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "enrichment complete"
        );
        Ok(result)
    }

    /// Page text for the prompt. Never fails: any fetch problem or an empty
    /// extraction yields [`SCRAPE_PLACEHOLDER`].
    async fn acquire_content(&self, url: &str) -> String {
        let html = match self.fetcher.fetch_html(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "page fetch failed, using placeholder");
                return SCRAPE_PLACEHOLDER.to_string();
            }
        };

        let extracted = extract_text(&html, self.settings.max_chars);
        if extracted.text.is_empty() {
            warn!("page had no visible text, using placeholder");
            return SCRAPE_PLACEHOLDER.to_string();
        }
        extracted.text
    }

    fn classify(&self, err: ModelError) -> ScoutError {
        match err {
            ModelError::RateLimited { retry_after, .. } => {
                let retry_after_secs = retry_after
                    .map(|d| d.as_secs().saturating_add(u64::from(d.subsec_nanos() > 0)))
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                warn!(retry_after_secs, "model quota exceeded");
                ScoutError::QuotaExceeded { retry_after_secs }
            }
            other => {
                error!(model = self.model.name(), error = %other, "model call failed");
                ScoutError::Pipeline {
                    message: other.to_string(),
                    detail: self
                        .settings
                        .environment
                        .is_development()
                        .then(|| format!("{other:?}")),
                }
            }
        }
    }
}

fn source_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}
