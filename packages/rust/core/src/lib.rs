//! Enrichment orchestration for VC Scout.
//!
//! Ties page fetching, text extraction, prompt building and the model call
//! into a single [`EnrichmentPipeline::enrich`] operation.

pub mod pipeline;
pub mod prompt;

pub use pipeline::{
    EXTRACTION_FAILED, EnrichmentPipeline, PipelineSettings, ProgressReporter, SCRAPE_PLACEHOLDER,
    SilentProgress,
};
pub use prompt::build_prompt;
