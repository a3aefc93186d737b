use super::{ProviderResult, SearchProvider};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

/// Brave HTML SERP. Markup shifts over time, so parsing leans on the
/// semantic pattern of anchors wrapping `h3` under `main`.
pub struct Brave;

fn extract_snippet(container: &ElementRef<'_>) -> String {
    let candidates = [
        "p.snippet-description",
        "div.snippet-description",
        "p",
        "div",
    ];
    for css in candidates {
        if let Ok(sel) = Selector::parse(css) {
            if let Some(n) = container.select(&sel).next() {
                let text = n
                    .text()
                    .collect::<String>()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ");
                if text.len() >= 20 {
                    return text;
                }
            }
        }
    }
    String::new()
}

pub fn parse_results(html: &str, limit: usize) -> Vec<ProviderResult> {
    let doc = Html::parse_document(html);
    let main_sel = Selector::parse("main").expect("static selector");
    let a_sel = Selector::parse("a[href]").expect("static selector");
    let h3_sel = Selector::parse("h3").expect("static selector");

    let mut out = Vec::new();
    let Some(main) = doc.select(&main_sel).next() else {
        return out;
    };

    for anchor in main.select(&a_sel) {
        if out.len() >= limit {
            break;
        }
        let Some(heading) = anchor.select(&h3_sel).next() else {
            continue;
        };
        let href = anchor.value().attr("href").unwrap_or("").trim();
        if !href.starts_with("http://") && !href.starts_with("https://") {
            continue;
        }
        let title = heading
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if title.is_empty() {
            continue;
        }
        let snippet = anchor
            .parent()
            .and_then(ElementRef::wrap)
            .map(|parent| extract_snippet(&parent))
            .unwrap_or_default();

        out.push(ProviderResult {
            url: href.to_string(),
            title,
            snippet,
            rank: out.len() + 1,
        });
    }
    out
}

#[async_trait]
impl SearchProvider for Brave {
    fn name(&self) -> &'static str {
        "brave"
    }

    fn trust(&self) -> f64 {
        0.5
    }

    async fn query(
        &self,
        client: &reqwest::Client,
        text: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ProviderResult>> {
        let mut url = reqwest::Url::parse("https://search.brave.com/search")?;
        url.query_pairs_mut().append_pair("q", text);

        let body = client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_results(&body, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_anchor_h3_pattern() {
        let html = r#"
            <main>
              <div class="result">
                <a href="https://example.test/one"><h3>First Result</h3></a>
                <p class="snippet-description">A reasonably long snippet about the first result.</p>
              </div>
              <div class="result">
                <a href="/relative"><h3>Dropped</h3></a>
              </div>
            </main>
        "#;
        let results = parse_results(html, 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "First Result");
        assert_eq!(results[0].url, "https://example.test/one");
    }

    #[test]
    fn no_main_element_yields_nothing() {
        assert!(parse_results("<div><a href='https://x.test'><h3>X</h3></a></div>", 10).is_empty());
    }
}
