//! Polite HTTP fetching: pooled connections, per-host spacing, robots.txt
//! enforcement, manual redirect handling, and bounded retries with
//! exponential backoff.

mod politeness;
mod robots;

pub use politeness::HostLedger;
pub use robots::{RobotsCache, RobotsPolicy};

use crate::core::error::{CrawlError, Result};
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

const USER_AGENT: &str = concat!("lorecrawl/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 5;
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
/// Bodies past this size are rejected without parsing.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Politeness hints passed per fetch; the ledger and robots cache live in
/// the fetcher so they span jobs.
#[derive(Debug, Clone)]
pub struct Politeness {
    /// Minimum spacing between fetches of the same host.
    pub min_delay: Duration,
    pub respect_robots: bool,
}

impl Default for Politeness {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            respect_robots: true,
        }
    }
}

#[derive(Debug)]
pub struct FetchResult {
    /// URL as requested.
    pub url: String,
    /// URL after following redirects.
    pub final_url: String,
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub duration: Duration,
}

pub struct Fetcher {
    client: reqwest::Client,
    ledger: HostLedger,
    robots: RobotsCache,
    /// Caps total in-flight outgoing requests across all jobs.
    outbound: tokio::sync::Semaphore,
}

impl Fetcher {
    /// Build a fetcher with its own pooled client. Redirects are followed
    /// manually so loops and limits stay observable.
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| CrawlError::Network(e.to_string()))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        let outbound_limit = std::env::var("OUTBOUND_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(32);
        Self {
            client,
            ledger: HostLedger::new(),
            robots: RobotsCache::new(),
            outbound: tokio::sync::Semaphore::new(outbound_limit),
        }
    }

    /// Fetch one URL under the given politeness contract.
    ///
    /// Suspension points: the robots lookup, the politeness delay, and the
    /// network wait — each races the cancellation token and fails with
    /// `Cancelled` promptly.
    pub async fn fetch(
        &self,
        url: &Url,
        politeness: &Politeness,
        cancel: &CancellationToken,
    ) -> Result<FetchResult> {
        let host = url
            .host_str()
            .ok_or_else(|| CrawlError::BadInput(format!("url without host: {}", url)))?
            .to_string();

        if cancel.is_cancelled() {
            return Err(CrawlError::Cancelled);
        }

        let mut min_delay = politeness.min_delay;
        if politeness.respect_robots {
            let policy = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CrawlError::Cancelled),
                policy = self.robots.policy_for(&self.client, url.scheme(), &host, url.port()) => policy,
            };
            if !policy.allows(url.path()) {
                return Err(CrawlError::RobotsDisallowed(url.to_string()));
            }
            // A robots crawl-delay longer than ours is honored.
            if let Some(delay) = policy.crawl_delay {
                min_delay = min_delay.max(Duration::from_secs_f64(delay.clamp(0.0, 60.0)));
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CrawlError::Cancelled),
            _ = self.ledger.wait_turn(&host, min_delay) => {}
        }

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CrawlError::Cancelled),
            permit = self.outbound.acquire() => permit.expect("outbound semaphore closed"),
        };

        let started = Instant::now();

        // Transient errors retry with jittered exponential backoff; the
        // attempt counter keeps the cap at MAX_ATTEMPTS regardless of how
        // fast the failures come back.
        let mut attempt = 0u32;
        let attempts = retry(
            ExponentialBackoffBuilder::new()
                .with_initial_interval(RETRY_BASE_DELAY)
                .with_max_interval(Duration::from_secs(4))
                .with_max_elapsed_time(None)
                .build(),
            || {
                attempt += 1;
                let current = attempt;
                async move {
                    match self.fetch_following_redirects(url, cancel).await {
                        Ok(result) => Ok(result),
                        Err(e) if e.is_transient() && current < MAX_ATTEMPTS => {
                            warn!(
                                "fetch {} attempt {}/{} failed: {} — backing off",
                                url, current, MAX_ATTEMPTS, e
                            );
                            Err(backoff::Error::transient(e))
                        }
                        Err(e) => Err(backoff::Error::permanent(e)),
                    }
                }
            },
        );

        let mut result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CrawlError::Cancelled),
            result = attempts => result?,
        };
        result.duration = started.elapsed();
        Ok(result)
    }

    async fn fetch_following_redirects(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<FetchResult> {
        let mut current = url.clone();
        let mut visited: Vec<String> = vec![current.to_string()];

        for _hop in 0..=MAX_REDIRECTS {
            let response = tokio::select! {
                _ = cancel.cancelled() => return Err(CrawlError::Cancelled),
                resp = self.client.get(current.clone()).send() => resp.map_err(map_reqwest_err)?,
            };

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| CrawlError::HttpStatus(status.as_u16()))?;
                let next = current
                    .join(location)
                    .map_err(|e| CrawlError::Network(format!("bad redirect target: {}", e)))?;
                if visited.contains(&next.to_string()) {
                    return Err(CrawlError::RedirectLoop(next.to_string()));
                }
                debug!("redirect {} -> {}", current, next);
                visited.push(next.to_string());
                current = next;
                continue;
            }

            if status.is_client_error() || status.is_server_error() {
                return Err(CrawlError::HttpStatus(status.as_u16()));
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            if let Some(len) = response.content_length() {
                if len as usize > MAX_BODY_BYTES {
                    return Err(CrawlError::BodyTooLarge {
                        url: current.to_string(),
                        limit: MAX_BODY_BYTES,
                    });
                }
            }

            // Stream the body so an unlabelled oversize response is cut
            // off at the cap instead of buffered whole.
            let mut body: Vec<u8> = Vec::new();
            let mut response = response;
            loop {
                let chunk = tokio::select! {
                    _ = cancel.cancelled() => return Err(CrawlError::Cancelled),
                    chunk = response.chunk() => chunk.map_err(map_reqwest_err)?,
                };
                match chunk {
                    Some(bytes) => {
                        if body.len() + bytes.len() > MAX_BODY_BYTES {
                            return Err(CrawlError::BodyTooLarge {
                                url: current.to_string(),
                                limit: MAX_BODY_BYTES,
                            });
                        }
                        body.extend_from_slice(&bytes);
                    }
                    None => break,
                }
            }

            return Ok(FetchResult {
                url: url.to_string(),
                final_url: current.to_string(),
                status: status.as_u16(),
                body,
                content_type,
                duration: Duration::ZERO,
            });
        }

        Err(CrawlError::TooManyRedirects(MAX_REDIRECTS))
    }
}

fn map_reqwest_err(e: reqwest::Error) -> CrawlError {
    if e.is_timeout() {
        CrawlError::Timeout(Duration::from_secs(30))
    } else {
        CrawlError::Network(e.to_string())
    }
}
