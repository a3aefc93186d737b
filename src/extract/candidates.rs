use crate::core::types::ContentType;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Where a candidate span sat in the document. Drives the default
/// `content_type` and is what `structure` rules match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralRole {
    HeadingParagraph,
    ListItem,
    /// Numbered list item under a "steps"-like heading.
    StepItem,
    CodeBlock,
    DefinitionPair,
    Blockquote,
}

impl StructuralRole {
    pub fn name(&self) -> &'static str {
        match self {
            StructuralRole::HeadingParagraph => "heading-paragraph",
            StructuralRole::ListItem => "list-item",
            StructuralRole::StepItem => "step-item",
            StructuralRole::CodeBlock => "code-block",
            StructuralRole::DefinitionPair => "definition",
            StructuralRole::Blockquote => "blockquote",
        }
    }

    pub fn default_content_type(&self) -> ContentType {
        match self {
            StructuralRole::HeadingParagraph => ContentType::Concept,
            StructuralRole::ListItem => ContentType::Example,
            StructuralRole::StepItem => ContentType::TutorialStep,
            StructuralRole::CodeBlock => ContentType::Code,
            StructuralRole::DefinitionPair => ContentType::Definition,
            StructuralRole::Blockquote => ContentType::Reference,
        }
    }
}

/// One candidate span awaiting classification and scoring.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub raw_text: String,
    /// Surrounding text, bounded length.
    pub context: String,
    pub role: StructuralRole,
    /// Ordinal within the enumeration pass.
    pub position: usize,
    pub heading: Option<String>,
}

const CONTEXT_MAX_CHARS: usize = 300;
const MIN_TEXT_WORDS: usize = 3;

const BOILERPLATE_CONTAINERS: &[&str] = &["nav", "footer", "header", "aside", "script", "style"];

fn in_boilerplate(element: &ElementRef) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .map(|e| BOILERPLATE_CONTAINERS.contains(&e.name()))
            .unwrap_or(false)
    })
}

fn text_of(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn bounded(text: &str) -> String {
    if text.chars().count() > CONTEXT_MAX_CHARS {
        text.chars().take(CONTEXT_MAX_CHARS).collect()
    } else {
        text.to_string()
    }
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// First `<p>` sibling after a heading, stopping at the next heading.
fn following_paragraph(heading: &ElementRef) -> Option<String> {
    for sibling in heading.next_siblings() {
        let Some(element) = ElementRef::wrap(sibling) else {
            continue;
        };
        let name = element.value().name();
        if is_heading(name) {
            return None;
        }
        if name == "p" {
            let text = text_of(&element);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Nearest heading before this element, climbing up to three ancestor
/// levels. Used to attach list items and code blocks to their section.
fn preceding_heading(element: &ElementRef) -> Option<String> {
    let mut node = Some(**element);
    for _level in 0..3 {
        let current = node?;
        for sibling in current.prev_siblings() {
            if let Some(el) = ElementRef::wrap(sibling) {
                if is_heading(el.value().name()) {
                    let text = text_of(&el);
                    if !text.is_empty() {
                        return Some(text);
                    }
                }
            }
        }
        node = current.parent();
    }
    None
}

fn heading_names_steps(heading: &str) -> bool {
    let lower = heading.to_lowercase();
    ["step", "how to", "instructions", "walkthrough", "getting started"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Enumerate candidate spans from a parsed document: heading+paragraph
/// pairs, list items, code blocks, definition lists, and blockquotes.
/// Boilerplate containers are skipped, duplicates collapse on normalized
/// text.
pub fn enumerate(document: &Html) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut position = 0usize;

    let mut push = |candidates: &mut Vec<Candidate>,
                    raw_text: String,
                    context: String,
                    role: StructuralRole,
                    heading: Option<String>| {
        let dedup_key = raw_text.to_lowercase();
        if !seen.insert(dedup_key) {
            return;
        }
        candidates.push(Candidate {
            raw_text,
            context: bounded(&context),
            role,
            position,
            heading,
        });
        position += 1;
    };

    let heading_sel = Selector::parse("h1, h2, h3, h4, h5, h6").expect("static selector");
    for heading in document.select(&heading_sel) {
        if in_boilerplate(&heading) {
            continue;
        }
        let heading_text = text_of(&heading);
        if heading_text.is_empty() {
            continue;
        }
        if let Some(paragraph) = following_paragraph(&heading) {
            if paragraph.split_whitespace().count() >= MIN_TEXT_WORDS {
                let context = format!("{}\n{}", heading_text, paragraph);
                push(
                    &mut candidates,
                    paragraph,
                    context,
                    StructuralRole::HeadingParagraph,
                    Some(heading_text),
                );
            }
        }
    }

    let li_sel = Selector::parse("li").expect("static selector");
    for item in document.select(&li_sel) {
        if in_boilerplate(&item) {
            continue;
        }
        let text = text_of(&item);
        if text.split_whitespace().count() < MIN_TEXT_WORDS {
            continue;
        }
        let ordered = item
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name() == "ol"))
            .unwrap_or(false);
        let list_el = item
            .parent()
            .and_then(ElementRef::wrap)
            .unwrap_or(item);
        let heading = preceding_heading(&list_el);
        let role = if ordered
            && heading
                .as_deref()
                .map(heading_names_steps)
                .unwrap_or(false)
        {
            StructuralRole::StepItem
        } else {
            StructuralRole::ListItem
        };
        let context = match &heading {
            Some(h) => format!("{}\n{}", h, text),
            None => text.clone(),
        };
        push(&mut candidates, text, context, role, heading);
    }

    let pre_sel = Selector::parse("pre").expect("static selector");
    for block in document.select(&pre_sel) {
        if in_boilerplate(&block) {
            continue;
        }
        let code = block.text().collect::<String>().trim().to_string();
        if code.is_empty() {
            continue;
        }
        let heading = preceding_heading(&block);
        let context = heading.clone().unwrap_or_default();
        push(
            &mut candidates,
            code,
            context,
            StructuralRole::CodeBlock,
            heading,
        );
    }

    let dl_sel = Selector::parse("dl").expect("static selector");
    let dt_sel = Selector::parse("dt").expect("static selector");
    let dd_sel = Selector::parse("dd").expect("static selector");
    for list in document.select(&dl_sel) {
        if in_boilerplate(&list) {
            continue;
        }
        let terms: Vec<String> = list.select(&dt_sel).map(|t| text_of(&t)).collect();
        let defs: Vec<String> = list.select(&dd_sel).map(|d| text_of(&d)).collect();
        for (term, def) in terms.iter().zip(defs.iter()) {
            if term.is_empty() || def.is_empty() {
                continue;
            }
            let text = format!("{}: {}", term, def);
            let context = text.clone();
            push(
                &mut candidates,
                text,
                context,
                StructuralRole::DefinitionPair,
                Some(term.clone()),
            );
        }
    }

    let quote_sel = Selector::parse("blockquote").expect("static selector");
    for quote in document.select(&quote_sel) {
        if in_boilerplate(&quote) {
            continue;
        }
        let text = text_of(&quote);
        if text.split_whitespace().count() < MIN_TEXT_WORDS {
            continue;
        }
        let heading = preceding_heading(&quote);
        let context = text.clone();
        push(
            &mut candidates,
            text,
            context,
            StructuralRole::Blockquote,
            heading,
        );
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_paragraph_pairs_are_found() {
        let html = Html::parse_document("<h1>Alpha</h1><p>Definition of Alpha.</p>");
        let candidates = enumerate(&html);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].raw_text, "Definition of Alpha.");
        assert_eq!(candidates[0].role, StructuralRole::HeadingParagraph);
        assert_eq!(candidates[0].heading.as_deref(), Some("Alpha"));
    }

    #[test]
    fn numbered_steps_under_steps_heading() {
        let html = Html::parse_document(
            "<h2>Steps to install</h2><ol>\
             <li>Download the installer package</li>\
             <li>Run the setup program now</li></ol>",
        );
        let candidates = enumerate(&html);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.role == StructuralRole::StepItem));
    }

    #[test]
    fn unordered_lists_stay_list_items() {
        let html = Html::parse_document(
            "<h2>Features</h2><ul><li>Fast parsing of documents</li></ul>",
        );
        let candidates = enumerate(&html);
        assert_eq!(candidates[0].role, StructuralRole::ListItem);
    }

    #[test]
    fn code_blocks_and_definitions() {
        let html = Html::parse_document(
            "<h3>Example</h3><pre>fn main() {}</pre>\
             <dl><dt>Frontier</dt><dd>URLs not yet fetched</dd></dl>",
        );
        let candidates = enumerate(&html);
        let roles: Vec<_> = candidates.iter().map(|c| c.role).collect();
        assert!(roles.contains(&StructuralRole::CodeBlock));
        assert!(roles.contains(&StructuralRole::DefinitionPair));
        let code = candidates
            .iter()
            .find(|c| c.role == StructuralRole::CodeBlock)
            .unwrap();
        assert_eq!(code.raw_text, "fn main() {}");
        assert_eq!(code.heading.as_deref(), Some("Example"));
    }

    #[test]
    fn navigation_content_is_skipped() {
        let html = Html::parse_document(
            "<nav><ul><li>Home page link here</li></ul></nav>\
             <h1>Real</h1><p>Actual content paragraph here.</p>",
        );
        let candidates = enumerate(&html);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].raw_text, "Actual content paragraph here.");
    }

    #[test]
    fn duplicate_spans_collapse() {
        let html = Html::parse_document(
            "<ul><li>Repeat me exactly once</li><li>Repeat me exactly once</li></ul>",
        );
        assert_eq!(enumerate(&html).len(), 1);
    }
}
