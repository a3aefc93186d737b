//! Multi-provider search fan-out: concurrent dispatch under a single
//! deadline, canonical-URL dedup, relevance scoring, per-provider hourly
//! quotas, and an explicit no-provider fallback mode.

pub mod providers;

use crate::core::error::{CrawlError, Result};
use crate::core::types::{WebSearchResponse, WebSearchResult};
use crate::extract::links;
use providers::{HourlyQuota, ProviderResult, SearchProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// Relevance weights: provider rank first, query/text overlap second,
// provider trust last.
const W_RANK: f64 = 0.5;
const W_OVERLAP: f64 = 0.3;
const W_TRUST: f64 = 0.2;

pub struct SearchDispatcher {
    providers: Vec<Arc<dyn SearchProvider>>,
    quota: HourlyQuota,
    deadline: Duration,
    filtering_threshold: f64,
    client: reqwest::Client,
    cache: moka::future::Cache<String, Vec<WebSearchResult>>,
}

impl SearchDispatcher {
    pub fn new(
        client: reqwest::Client,
        providers: Vec<Arc<dyn SearchProvider>>,
        rate_limit: u32,
        deadline: Duration,
        filtering_threshold: f64,
    ) -> Self {
        Self {
            providers,
            quota: HourlyQuota::new(rate_limit),
            deadline,
            filtering_threshold,
            client,
            cache: moka::future::Cache::builder()
                .max_capacity(10_000)
                .time_to_live(Duration::from_secs(60 * 10))
                .build(),
        }
    }

    /// Build from the config section, mapping provider names to adapters.
    /// Unknown names are logged and skipped.
    pub fn from_config(client: reqwest::Client, section: &crate::core::config::SearchSection) -> Self {
        let mut providers: Vec<Arc<dyn SearchProvider>> = Vec::new();
        for name in section.resolve_providers() {
            match name.as_str() {
                "duckduckgo" | "ddg" => providers.push(Arc::new(providers::duckduckgo::DuckDuckGo)),
                "brave" => providers.push(Arc::new(providers::brave::Brave)),
                other => warn!("unknown search provider '{}' ignored", other),
            }
        }
        Self::new(
            client,
            providers,
            section.resolve_rate_limit(),
            Duration::from_millis(section.resolve_deadline_ms()),
            section.resolve_filtering_threshold(),
        )
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Fan a query out to every in-budget provider and return one merged,
    /// deduplicated, scored list.
    ///
    /// Never fails for lack of providers: the degraded cases return an
    /// empty list with a diagnostic `reason`.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<WebSearchResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CrawlError::BadInput("empty search query".to_string()));
        }
        let max_results = max_results.max(1);

        if self.providers.is_empty() {
            debug!("search dispatched with no providers configured");
            return Ok(WebSearchResponse {
                query: query.to_string(),
                results: Vec::new(),
                reason: Some("no providers".to_string()),
            });
        }

        let cache_key = format!("{}|{}", query, max_results);
        if let Some(results) = self.cache.get(&cache_key).await {
            debug!("search cache hit for '{}'", query);
            return Ok(WebSearchResponse {
                query: query.to_string(),
                results,
                reason: None,
            });
        }

        let mut eligible = Vec::new();
        for provider in &self.providers {
            if self.quota.try_acquire(provider.name()).await {
                eligible.push(Arc::clone(provider));
            } else {
                info!("provider {} out of hourly budget, skipped", provider.name());
            }
        }
        if eligible.is_empty() {
            return Ok(WebSearchResponse {
                query: query.to_string(),
                results: Vec::new(),
                reason: Some("provider quotas exhausted".to_string()),
            });
        }

        // One deadline across the whole fan-out; a slow provider forfeits
        // its batch while the others still land.
        let fetches = eligible.iter().map(|provider| {
            let provider = Arc::clone(provider);
            let client = self.client.clone();
            let deadline = self.deadline;
            async move {
                let name = provider.name();
                match tokio::time::timeout(deadline, provider.query(&client, query, max_results * 2))
                    .await
                {
                    Ok(Ok(results)) => (name, provider.trust(), results),
                    Ok(Err(e)) => {
                        warn!("provider {} failed: {}", name, e);
                        (name, provider.trust(), Vec::new())
                    }
                    Err(_) => {
                        warn!("provider {} missed the {}ms deadline", name, deadline.as_millis());
                        (name, provider.trust(), Vec::new())
                    }
                }
            }
        });
        let batches = futures::future::join_all(fetches).await;

        let results = merge_and_score(query, batches, self.filtering_threshold, max_results);
        info!("search '{}' returned {} merged results", query, results.len());

        self.cache.insert(cache_key, results.clone()).await;
        Ok(WebSearchResponse {
            query: query.to_string(),
            results,
            reason: None,
        })
    }
}

struct Merged {
    result: WebSearchResult,
    trust: f64,
}

fn merge_and_score(
    query: &str,
    batches: Vec<(&'static str, f64, Vec<ProviderResult>)>,
    threshold: f64,
    max_results: usize,
) -> Vec<WebSearchResult> {
    let mut by_url: HashMap<String, Merged> = HashMap::new();

    for (provider, trust, batch) in batches {
        for raw in batch {
            let Some(canonical) = links::canonicalize_str(&raw.url) else {
                continue;
            };
            let key = canonical.to_string();

            match by_url.get_mut(&key) {
                Some(merged) => {
                    if !merged.result.providers.contains(&provider.to_string()) {
                        merged.result.providers.push(provider.to_string());
                    }
                    // Best rank wins; snippets merge toward the richer one.
                    if raw.rank < merged.result.rank {
                        merged.result.rank = raw.rank;
                        if !raw.title.trim().is_empty() {
                            merged.result.title = raw.title;
                        }
                    }
                    if merged.result.snippet.trim().is_empty()
                        || raw.snippet.len() > merged.result.snippet.len()
                    {
                        if !raw.snippet.trim().is_empty() {
                            merged.result.snippet = raw.snippet;
                        }
                    }
                    merged.trust = merged.trust.max(trust);
                }
                None => {
                    by_url.insert(
                        key.clone(),
                        Merged {
                            result: WebSearchResult {
                                url: key,
                                title: raw.title,
                                snippet: raw.snippet,
                                providers: vec![provider.to_string()],
                                rank: raw.rank,
                                relevance: 0.0,
                            },
                            trust,
                        },
                    );
                }
            }
        }
    }

    let query_tokens = tokenize(query);
    let mut results: Vec<WebSearchResult> = by_url
        .into_values()
        .map(|mut merged| {
            let overlap = token_overlap(
                &query_tokens,
                &format!("{} {}", merged.result.title, merged.result.snippet),
            );
            let rank_score = 1.0 / merged.result.rank.max(1) as f64;
            merged.result.relevance =
                (W_RANK * rank_score + W_OVERLAP * overlap + W_TRUST * merged.trust).clamp(0.0, 1.0);
            merged.result
        })
        .filter(|r| r.relevance >= threshold)
        .collect();

    results.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.url.cmp(&b.url))
    });
    results.truncate(max_results);
    results
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.len() > 2)
        .map(|s| s.to_string())
        .collect()
}

/// Share of query tokens present in the candidate text.
fn token_overlap(query_tokens: &[String], text: &str) -> f64 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let text_tokens = tokenize(text);
    let hits = query_tokens
        .iter()
        .filter(|t| text_tokens.contains(t))
        .count();
    hits as f64 / query_tokens.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StaticProvider {
        name: &'static str,
        results: Vec<ProviderResult>,
    }

    #[async_trait]
    impl SearchProvider for StaticProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn query(
            &self,
            _client: &reqwest::Client,
            _text: &str,
            _limit: usize,
        ) -> anyhow::Result<Vec<ProviderResult>> {
            Ok(self.results.clone())
        }
    }

    fn provider_result(url: &str, title: &str, rank: usize) -> ProviderResult {
        ProviderResult {
            url: url.to_string(),
            title: title.to_string(),
            snippet: format!("snippet about {}", title),
            rank,
        }
    }

    fn dispatcher(providers: Vec<Arc<dyn SearchProvider>>) -> SearchDispatcher {
        SearchDispatcher::new(
            reqwest::Client::new(),
            providers,
            100,
            Duration::from_secs(5),
            0.2,
        )
    }

    #[tokio::test]
    async fn no_providers_is_fallback_not_error() {
        let dispatcher = dispatcher(vec![]);
        let response = dispatcher.search("anything", 10).await.unwrap();
        assert!(response.results.is_empty());
        assert_eq!(response.reason.as_deref(), Some("no providers"));
    }

    #[tokio::test]
    async fn empty_query_is_bad_input() {
        let dispatcher = dispatcher(vec![]);
        let err = dispatcher.search("   ", 10).await.unwrap_err();
        assert!(matches!(err, CrawlError::BadInput(_)));
    }

    #[tokio::test]
    async fn duplicates_corroborate_and_dedup() {
        // Two providers both return /a (one via a fragment variant), one
        // also returns /b: expect exactly two merged results.
        let a: Arc<dyn SearchProvider> = Arc::new(StaticProvider {
            name: "alpha",
            results: vec![provider_result("http://x.test/a", "Shared", 1)],
        });
        let b: Arc<dyn SearchProvider> = Arc::new(StaticProvider {
            name: "beta",
            results: vec![
                provider_result("http://x.test/a#section", "Shared", 2),
                provider_result("http://x.test/b", "Solo", 1),
            ],
        });

        let dispatcher = dispatcher(vec![a, b]);
        let response = dispatcher.search("shared solo", 10).await.unwrap();
        assert_eq!(response.results.len(), 2);

        let mut urls: Vec<&str> = response.results.iter().map(|r| r.url.as_str()).collect();
        let total = urls.len();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), total, "canonical URLs must be unique");

        let shared = response
            .results
            .iter()
            .find(|r| r.url.contains("/a"))
            .unwrap();
        assert_eq!(shared.providers.len(), 2);
        assert_eq!(shared.rank, 1);
    }

    #[tokio::test]
    async fn relevance_filter_drops_weak_results() {
        let p: Arc<dyn SearchProvider> = Arc::new(StaticProvider {
            name: "alpha",
            results: vec![provider_result("http://x.test/far", "unrelated words", 50)],
        });
        let dispatcher = SearchDispatcher::new(
            reqwest::Client::new(),
            vec![p],
            100,
            Duration::from_secs(5),
            0.5,
        );
        let response = dispatcher.search("rust ownership", 10).await.unwrap();
        assert!(response.results.is_empty());
        assert!(response.reason.is_none());
    }

    #[tokio::test]
    async fn quota_exhaustion_reports_reason() {
        let p: Arc<dyn SearchProvider> = Arc::new(StaticProvider {
            name: "alpha",
            results: vec![provider_result("http://x.test/a", "thing", 1)],
        });
        let dispatcher = SearchDispatcher::new(
            reqwest::Client::new(),
            vec![p],
            1,
            Duration::from_secs(5),
            0.0,
        );
        assert!(dispatcher.search("first", 5).await.unwrap().reason.is_none());
        let second = dispatcher.search("second", 5).await.unwrap();
        assert_eq!(
            second.reason.as_deref(),
            Some("provider quotas exhausted")
        );
    }

    #[test]
    fn overlap_is_fractional() {
        let tokens = tokenize("rust ownership model");
        assert!((token_overlap(&tokens, "the ownership model in rust") - 1.0).abs() < 1e-9);
        assert!(token_overlap(&tokens, "cooking pasta") < 1e-9);
    }
}
