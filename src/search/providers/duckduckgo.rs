use super::{ProviderResult, SearchProvider};
use async_trait::async_trait;
use scraper::{Html, Selector};

/// DuckDuckGo HTML endpoint: no API key, stable markup.
pub struct DuckDuckGo;

fn normalize_href(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let candidate = if href.starts_with("//") {
        format!("https:{}", href)
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{}", href)
    } else {
        href.to_string()
    };

    // Unwrap the redirect link to the real destination.
    if let Ok(url) = url::Url::parse(&candidate) {
        if matches!(url.host_str(), Some("duckduckgo.com")) && url.path().starts_with("/l/") {
            for (k, v) in url.query_pairs() {
                if k == "uddg" && !v.trim().is_empty() {
                    return Some(v.to_string());
                }
            }
        }
    }

    if candidate.starts_with("http://") || candidate.starts_with("https://") {
        return Some(candidate);
    }
    None
}

pub fn parse_results(html: &str, limit: usize) -> Vec<ProviderResult> {
    let doc = Html::parse_document(html);
    let sel_item = Selector::parse("div.results_links, div.result").expect("static selector");
    let sel_link = Selector::parse("a.result__a").expect("static selector");
    let sel_snip =
        Selector::parse("a.result__snippet, div.result__snippet").expect("static selector");

    let mut out = Vec::new();
    for item in doc.select(&sel_item) {
        if out.len() >= limit {
            break;
        }
        let Some(link) = item.select(&sel_link).next() else {
            continue;
        };
        let Some(href) = normalize_href(link.value().attr("href").unwrap_or("")) else {
            continue;
        };
        let title = link
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let snippet = item
            .select(&sel_snip)
            .next()
            .map(|n| {
                n.text()
                    .collect::<String>()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        out.push(ProviderResult {
            url: href,
            title,
            snippet,
            rank: out.len() + 1,
        });
    }
    out
}

#[async_trait]
impl SearchProvider for DuckDuckGo {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    fn trust(&self) -> f64 {
        0.6
    }

    async fn query(
        &self,
        client: &reqwest::Client,
        text: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ProviderResult>> {
        let mut url = reqwest::Url::parse("https://html.duckduckgo.com/html/")?;
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
