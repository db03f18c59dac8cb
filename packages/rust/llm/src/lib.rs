//! Text-generation model seam and the Gemini provider client.
//!
//! The enrichment pipeline talks to a [`TextModel`]; [`GeminiModel`] is the
//! production implementation over the Generative Language REST API.

mod error;
mod gemini;

use std::future::Future;

pub use error::ModelError;
pub use gemini::GeminiModel;

/// A model that answers a single prompt with raw JSON text.
///
/// The credential is supplied per call; implementations hold no secrets.
pub trait TextModel: Send + Sync {
    /// Model identifier for logs.
    fn name(&self) -> &str;

    /// Send `prompt` in JSON response mode and return the raw text answer.
    /// One request, no retries.
    fn generate_json(
        &self,
        api_key: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<String, ModelError>> + Send;
}
