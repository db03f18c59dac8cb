//! Core domain types for company enrichment.
//!
//! Field names serialize in camelCase; this is the contract the dashboard
//! consumes.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Inbound enrichment request.
///
/// Both fields are optional at the decoding layer so a missing URL becomes a
/// validation error rather than a decoder rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentRequest {
    /// Opaque identifier echoed back in the result.
    #[serde(default)]
    pub company_id: String,
    /// Page to scrape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

// ---------------------------------------------------------------------------
// Model output
// ---------------------------------------------------------------------------

/// The four fields the model is asked to produce. All are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntelligenceFields {
    pub summary: String,
    pub what_they_do: Vec<String>,
    pub keywords: Vec<String>,
    pub signals: Vec<String>,
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Provenance entry: where the content came from and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub url: String,
    /// Local wall-clock time the result was assembled.
    pub timestamp: String,
}

/// A complete enrichment. There is no partial form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResult {
    pub company_id: String,
    /// Short free-text description (two sentences requested).
    pub summary: String,
    /// Capability bullets.
    pub what_they_do: Vec<String>,
    /// Sector/tech/model tags.
    pub keywords: Vec<String>,
    /// Funding, hiring and growth indicators.
    pub signals: Vec<String>,
    /// Exactly one entry per call.
    pub sources: Vec<SourceRef>,
}

impl EnrichmentResult {
    /// Merge decoded model fields with the request's correlation id and a
    /// single provenance entry.
    pub fn assemble(
        company_id: impl Into<String>,
        fields: IntelligenceFields,
        source: SourceRef,
    ) -> Self {
        Self {
            company_id: company_id.into(),
            summary: fields.summary,
            what_they_do: fields.what_they_do,
            keywords: fields.keywords,
            signals: fields.signals,
            sources: vec![source],
        }
    }
}
