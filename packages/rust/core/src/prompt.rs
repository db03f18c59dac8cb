//! Prompt assembly for company enrichment.

/// Marker line preceding the page text inside the prompt.
pub const CONTENT_MARKER: &str = "CONTENT:";

/// Build the single analyst prompt sent to the model.
///
/// The URL and the page text (or the scrape placeholder) are embedded
/// verbatim.
pub fn build_prompt(url: &str, content: &str) -> String {
    format!(
        r#"You are a venture capital research analyst. Analyze the website content from {url}.
Respond with a raw JSON object that has exactly these four fields and nothing else:
{{
  "summary": "two-sentence summary of the company's vision and product",
  "whatTheyDo": ["key capability", "key capability", "key capability"],
  "keywords": ["sector", "technology", "business model"],
  "signals": ["funding, hiring or growth indicator"]
}}

{CONTENT_MARKER}
{content}
"#
    )
}
