//! Visible-text extraction from company web pages.
//!
//! Parses raw HTML with `scraper`, drops non-content subtrees, picks the
//! primary content region and flattens it to a single whitespace-normalized
//! line that is cut at a hard character budget.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, instrument};

/// Elements whose text never reaches the model.
pub const STRIPPED_TAGS: [&str; 6] = ["script", "style", "nav", "footer", "iframe", "noscript"];

static MAIN_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("main").expect("valid selector"));
static BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Which part of the document the text was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// One or more `<main>` elements.
    Main,
    /// The `<body>` element.
    Body,
    /// The whole document (no body could be located).
    Document,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Body => "body",
            Self::Document => "document",
        }
    }
}

/// Result of extracting text from an HTML page.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    /// Whitespace-collapsed visible text, at most `max_chars` characters.
    pub text: String,
    /// Region the text came from.
    pub region: Region,
    /// Whether the budget cut the text short.
    pub truncated: bool,
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract the visible text of an HTML document.
///
/// 1. Ignores `script`, `style`, `nav`, `footer`, `iframe` and `noscript` subtrees
/// 2. Uses `<main>` when present, otherwise `<body>`
/// 3. Collapses whitespace runs to single spaces and trims
/// 4. Keeps the first `max_chars` characters
#[instrument(skip(html), fields(html_len = html.len()))]
pub fn extract_text(html: &str, max_chars: usize) -> ExtractedText {
    let doc = Html::parse_document(html);
    let (raw, region) = region_text(&doc);

    let collapsed = collapse_whitespace(&raw);
    let (text, truncated) = truncate_chars(&collapsed, max_chars);

    debug!(
        region = region.as_str(),
        chars = text.chars().count(),
        truncated,
        "text extracted"
    );

    ExtractedText {
        text: text.to_string(),
        region,
        truncated,
    }
}

/// Collapse every whitespace run (including non-breaking spaces) to a
/// single ASCII space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    WS_RE.replace_all(text, " ").trim().to_string()
}

/// Cut `text` after `max_chars` Unicode scalar values. Never splits a code
/// point. Returns the prefix and whether anything was dropped.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Pick the content region and return its raw visible text.
fn region_text(doc: &Html) -> (String, Region) {
    // A <main> nested in stripped chrome is gone, and a <main> nested in
    // another <main> is already covered by its parent.
    let mains: Vec<ElementRef<'_>> = doc
        .select(&MAIN_SEL)
        .filter(|el| {
            !el.ancestors()
                .any(|a| is_stripped(a.value()) || is_tag(a.value(), "main"))
        })
        .collect();

    if !mains.is_empty() {
        let text = mains.iter().map(visible_text).collect::<String>();
        return (text, Region::Main);
    }

    if let Some(body) = doc.select(&BODY_SEL).next() {
        return (visible_text(&body), Region::Body);
    }

    (visible_text(&doc.root_element()), Region::Document)
}

/// Concatenate the text nodes under `root` that are not inside a stripped
/// element.
fn visible_text(root: &ElementRef<'_>) -> String {
    let mut out = String::new();

    for node in root.descendants() {
        if let Node::Text(text) = node.value() {
            if node.ancestors().any(|a| is_stripped(a.value())) {
                continue;
            }
            out.push_str(text);
        }
    }

    out
}

fn is_stripped(node: &Node) -> bool {
    node.as_element()
        .is_some_and(|el| STRIPPED_TAGS.contains(&el.name()))
}

fn is_tag(node: &Node, tag: &str) -> bool {
    node.as_element().is_some_and(|el| el.name() == tag)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
