//! Document extraction: boilerplate-aware candidate spans, outbound link
//! discovery, title and language metadata.
//!
//! Extraction is fully synchronous: it runs CPU-bound inside the crawl
//! worker between suspension points and never holds the parsed tree across
//! an await.

pub mod candidates;
pub mod language;
pub mod links;

pub use candidates::{Candidate, StructuralRole};
pub use language::LanguageInfo;
pub use links::LinkPolicy;

use crate::core::error::{CrawlError, Result};
use scraper::{Html, Selector};
use url::Url;

#[derive(Debug)]
pub struct PageExtraction {
    pub title: Option<String>,
    pub language: Option<LanguageInfo>,
    pub candidates: Vec<Candidate>,
    pub links: Vec<Url>,
}

/// Parse an HTML body and produce candidates plus outbound links.
///
/// An effectively empty body is a parse failure; the page is recorded with
/// `parse-failed` and no bits are extracted.
pub fn extract_page(base: &Url, body: &str, policy: &LinkPolicy) -> Result<PageExtraction> {
    if body.trim().is_empty() {
        return Err(CrawlError::ParseFailed(format!("empty body at {}", base)));
    }

    let document = Html::parse_document(body);

    let title = extract_title(&document);
    let candidates = candidates::enumerate(&document);
    let links = links::discover(&document, base, policy);

    let text_sample: String = candidates
        .iter()
        .filter(|c| c.role != StructuralRole::CodeBlock)
        .map(|c| c.raw_text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let language = language::detect(&text_sample);

    Ok(PageExtraction {
        title,
        language,
        candidates,
        links,
    })
}

/// `<title>` wins; the first `<h1>` is the fallback for pages without one.
fn extract_title(document: &Html) -> Option<String> {
    let title_sel = Selector::parse("title").expect("static selector");
    if let Some(el) = document.select(&title_sel).next() {
        let text = el.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            return Some(text);
        }
    }
    let h1_sel = Selector::parse("h1").expect("static selector");
    document.select(&h1_sel).next().and_then(|el| {
        let text = el
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    })
}
