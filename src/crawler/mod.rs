//! The crawl loop for one job: depth-limited BFS over a deterministic
//! frontier, politeness delegated to the fetcher, bits emitted through the
//! classify/score pipeline into the store.

mod frontier;

pub use frontier::Frontier;

use crate::core::app_state::Core;
use crate::core::error::{CrawlError, Result};
use crate::core::types::{
    bit_id_for, content_hash_for, page_id_for, CrawlJob, LearningBit, Page, PageStatus,
};
use crate::extract::{self, links, LinkPolicy};
use crate::fetcher::Politeness;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// A host is sidelined for the rest of the job after this many
/// consecutive failures.
const HOST_FAILURE_LIMIT: u32 = 20;

/// Per-job crawl configuration as accepted at the tool boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub max_pages: usize,
    pub max_depth: usize,
    pub follow_links: bool,
    /// Minimum seconds between fetches of the same host.
    pub crawl_delay: f64,
    pub respect_robots: bool,
    pub same_host_only: bool,
    pub allow_hosts: Vec<String>,
    pub deny_hosts: Vec<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: 50,
            max_depth: 3,
            follow_links: true,
            crawl_delay: 1.0,
            respect_robots: true,
            same_host_only: true,
            allow_hosts: Vec::new(),
            deny_hosts: Vec::new(),
        }
    }
}

impl CrawlConfig {
    pub fn politeness(&self) -> Politeness {
        Politeness {
            min_delay: Duration::from_secs_f64(self.crawl_delay.max(0.0)),
            respect_robots: self.respect_robots,
        }
    }
}

/// Run one crawl job to completion, mutating `job.metrics` as it goes so
/// partial progress survives cancellation and timeouts.
///
/// A single URL failure is local: counted, logged, never fatal for the
/// job. Only cancellation and store unavailability abort the loop.
pub async fn run_crawl(core: &Arc<Core>, job: &mut CrawlJob, cancel: &CancellationToken) -> Result<()> {
    let seed = parse_seed(&job.seed_url)?;
    let config = job.config.clone();
    let politeness = config.politeness();

    let policy = LinkPolicy {
        same_host_only: config.same_host_only,
        base_host: seed.host_str().unwrap_or_default().to_string(),
        allow_hosts: config.allow_hosts.clone(),
        deny_hosts: config.deny_hosts.clone(),
    };

    let canonical_seed = links::canonicalize(&seed);
    let mut frontier = Frontier::new();
    frontier.push(0, canonical_seed.as_str());

    let mut visited_urls: HashSet<String> = HashSet::new();
    visited_urls.insert(canonical_seed.to_string());
    let mut visited_hashes: HashSet<String> = HashSet::new();
    let mut host_failures: HashMap<String, u32> = HashMap::new();
    let mut blacklisted_hosts: HashSet<String> = HashSet::new();
    let mut tracker = crate::classify::RetentionTracker::new();

    info!(
        "crawl {} starting at {} (max_pages {}, max_depth {})",
        job.job_id, canonical_seed, config.max_pages, config.max_depth
    );

    while let Some((depth, url_str)) = frontier.pop() {
        if cancel.is_cancelled() {
            return Err(CrawlError::Cancelled);
        }
        if job.metrics.pages_fetched >= config.max_pages {
            debug!("page budget reached for job {}", job.job_id);
            break;
        }
        if depth > config.max_depth {
            continue;
        }

        let Ok(url) = Url::parse(&url_str) else {
            continue;
        };
        let host = url.host_str().unwrap_or_default().to_string();
        if blacklisted_hosts.contains(&host) {
            job.metrics.pages_skipped += 1;
            job.metrics.count_error("policy");
            continue;
        }

        let fetched = core.fetcher.fetch(&url, &politeness, cancel).await;
        let result = match fetched {
            Ok(result) => {
                host_failures.remove(&host);
                result
            }
            Err(CrawlError::Cancelled) => return Err(CrawlError::Cancelled),
            Err(CrawlError::RobotsDisallowed(_)) => {
                record_skip(core, &url, depth, PageStatus::SkippedRobots).await?;
                job.metrics.pages_skipped += 1;
                job.metrics.count_error("policy");
                continue;
            }
            Err(CrawlError::BodyTooLarge { .. }) => {
                record_skip(core, &url, depth, PageStatus::Skipped).await?;
                job.metrics.pages_skipped += 1;
                job.metrics.count_error("oversize");
                continue;
            }
            Err(e @ CrawlError::StoreUnavailable(_)) => return Err(e),
            Err(e) => {
                warn!("fetch of {} failed: {}", url, e);
                job.metrics.count_error(e.class());
                let failures = host_failures.entry(host.clone()).or_insert(0);
                *failures += 1;
                if *failures >= HOST_FAILURE_LIMIT {
                    warn!(
                        "host {} blacklisted for job {} after {} consecutive failures",
                        host, job.job_id, failures
                    );
                    blacklisted_hosts.insert(host);
                }
                continue;
            }
        };

        job.metrics.pages_fetched += 1;
        job.metrics.bytes_downloaded += result.body.len() as u64;

        let content_hash = content_hash_for(&result.body);
        let already_seen = visited_hashes.contains(&content_hash)
            || core
                .store
                .find_page_by_content_hash(&content_hash)
                .await?
                .is_some();
        if already_seen {
            let page = skip_page(&url, depth, PageStatus::SkippedDedup);
            core.store.upsert_page(&page).await?;
            job.metrics.pages_skipped += 1;
            debug!("dedup hit for {} ({})", url, content_hash);
            continue;
        }
        visited_hashes.insert(content_hash.clone());

        if !looks_like_text(result.content_type.as_deref()) {
            record_skip(core, &url, depth, PageStatus::Skipped).await?;
            job.metrics.pages_skipped += 1;
            continue;
        }

        let body = String::from_utf8_lossy(&result.body);
        let extraction = match extract::extract_page(&url, &body, &policy) {
            Ok(extraction) => extraction,
            Err(CrawlError::ParseFailed(reason)) => {
                debug!("parse failed for {}: {}", url, reason);
                let mut page = skip_page(&url, depth, PageStatus::ParseFailed);
                page.content_hash = content_hash;
                page.byte_length = result.body.len();
                core.store.upsert_page(&page).await?;
                job.metrics.count_error("parse");
                continue;
            }
            Err(e) => return Err(e),
        };

        let canonical = links::canonicalize(&url);
        let page = Page {
            page_id: page_id_for(canonical.as_str()),
            url: canonical.to_string(),
            domain: host.clone(),
            depth,
            fetched_at: Utc::now(),
            last_seen: Utc::now(),
            content_hash,
            status: PageStatus::Fetched,
            title: extraction.title.clone(),
            language: extraction.language.as_ref().map(|l| l.code.clone()),
            byte_length: result.body.len(),
            reference_count: 0,
        };
        core.store.upsert_page(&page).await?;

        // Classification snapshot for the whole page: rule updates landing
        // mid-page apply from the next page on.
        let rule_set = core.rule_set().await;
        let thresholds = core.thresholds().await;

        let mut kept_bits: Vec<LearningBit> = Vec::new();
        for candidate in &extraction.candidates {
            let classification = rule_set.classify(candidate);
            let scores = crate::classify::score(
                candidate,
                &classification,
                depth,
                0,
                rule_set.keywords(),
                extraction.language.as_ref(),
            );
            let kept = crate::classify::keep(scores, &classification.category, &thresholds);
            tracker.observe(
                &classification.category,
                scores.importance,
                scores.confidence,
                &thresholds,
                kept,
            );
            if !kept {
                continue;
            }
            kept_bits.push(LearningBit {
                bit_id: bit_id_for(&page.page_id, &candidate.raw_text),
                page_id: page.page_id.clone(),
                content: candidate.raw_text.clone(),
                context: candidate.context.clone(),
                content_type: classification.content_type,
                category: classification.category,
                subcategory: classification.subcategory,
                complexity_level: crate::extract::language::estimate_complexity(
                    &candidate.raw_text,
                ),
                importance_score: scores.importance,
                confidence_score: scores.confidence,
                tags: classification.tags,
                extracted_at: Utc::now(),
                reference_count: 0,
            });
        }

        let inserted = core.store.insert_bits(&kept_bits).await?;
        job.metrics.bits_emitted += inserted;

        // Bits extracted under the same heading are related to each other.
        let cross_refs = relate_by_heading(&extraction.candidates, &kept_bits);
        if !cross_refs.is_empty() {
            core.store.insert_cross_refs(&cross_refs).await?;
        }

        if tracker.should_adapt() {
            let current = core.thresholds().await;
            let next = tracker.adapt(&current);
            core.apply_thresholds(next).await?;
        }

        if config.follow_links && depth < config.max_depth {
            for link in &extraction.links {
                let link_str = link.to_string();
                if visited_urls.contains(&link_str) {
                    continue;
                }
                visited_urls.insert(link_str.clone());
                frontier.push(depth + 1, &link_str);
                job.metrics.links_discovered += 1;
            }
        }
    }

    info!(
        "crawl {} finished: {} pages, {} bits, {} bytes",
        job.job_id,
        job.metrics.pages_fetched,
        job.metrics.bits_emitted,
        job.metrics.bytes_downloaded
    );
    Ok(())
}

/// Pair up kept bits that came from candidates under the same heading,
/// chaining neighbors rather than building a full clique.
fn relate_by_heading(
    candidates: &[crate::extract::Candidate],
    kept: &[LearningBit],
) -> Vec<crate::core::types::CrossReference> {
    let heading_of: HashMap<&str, &str> = candidates
        .iter()
        .filter_map(|c| c.heading.as_deref().map(|h| (c.raw_text.as_str(), h)))
        .collect();

    let mut by_heading: HashMap<&str, Vec<&LearningBit>> = HashMap::new();
    for bit in kept {
        if let Some(heading) = heading_of.get(bit.content.as_str()) {
            by_heading.entry(*heading).or_default().push(bit);
        }
    }

    let mut refs = Vec::new();
    for group in by_heading.values() {
        for pair in group.windows(2) {
            refs.push(crate::core::types::CrossReference {
                source_bit_id: pair[0].bit_id.clone(),
                target_bit_id: pair[1].bit_id.clone(),
                relation_type: crate::core::types::RelationType::Related,
                strength: 0.5,
                created_at: Utc::now(),
            });
        }
    }
    refs
}

fn parse_seed(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CrawlError::BadInput("empty seed url".to_string()));
    }
    let url = Url::parse(trimmed)
        .map_err(|e| CrawlError::BadInput(format!("invalid seed url '{}': {}", trimmed, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(CrawlError::BadInput(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(CrawlError::BadInput(format!("seed url without host: {}", trimmed)));
    }
    Ok(url)
}

fn skip_page(url: &Url, depth: usize, status: PageStatus) -> Page {
    let canonical = links::canonicalize(url);
    Page {
        page_id: page_id_for(canonical.as_str()),
        url: canonical.to_string(),
        domain: url.host_str().unwrap_or_default().to_string(),
        depth,
        fetched_at: Utc::now(),
        last_seen: Utc::now(),
        content_hash: String::new(),
        status,
        title: None,
        language: None,
        byte_length: 0,
        reference_count: 0,
    }
}

async fn record_skip(core: &Arc<Core>, url: &Url, depth: usize, status: PageStatus) -> Result<()> {
    core.store.upsert_page(&skip_page(url, depth, status)).await
}

fn looks_like_text(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(ct) => {
            let ct = ct.to_ascii_lowercase();
            ct.contains("html") || ct.contains("text") || ct.contains("xml")
        }
    }
}
