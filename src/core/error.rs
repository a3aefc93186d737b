use thiserror::Error;

/// Error taxonomy for the crawl pipeline.
///
/// Variants are grouped by how callers react to them: transient errors are
/// retried with backoff, policy skips are counted but never logged as errors,
/// and structural errors (`BadInput`, `StoreUnavailable`) surface to the tool
/// caller untouched.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Connection reset, DNS failure, or any other transport-level error.
    /// Retried with exponential backoff.
    #[error("network error: {0}")]
    Network(String),

    /// Hard deadline elapsed (request timeout or job deadline).
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Non-success HTTP status. 5xx is treated as transient, 4xx is fatal
    /// for the URL but never for the job.
    #[error("http status {0}")]
    HttpStatus(u16),

    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),

    #[error("redirect loop at {0}")]
    RedirectLoop(String),

    /// robots.txt disallows this URL. Counted and skipped, not an error.
    #[error("robots.txt disallows {0}")]
    RobotsDisallowed(String),

    /// The host accumulated too many consecutive failures within one job.
    #[error("host {0} blacklisted for this job")]
    HostBlacklisted(String),

    /// Response body exceeded the parse cap; page recorded as skipped.
    #[error("body of {url} exceeds {limit} bytes")]
    BodyTooLarge { url: String, limit: usize },

    /// Document could not be parsed; page recorded with `parse-failed`.
    #[error("parse failed: {0}")]
    ParseFailed(String),

    /// Persistent storage failure after retries. Fatal for the operation.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A search provider ran out of its hourly request budget.
    #[error("provider {0} quota exhausted")]
    QuotaExhausted(String),

    /// Cooperative cancellation. Never logged as an error.
    #[error("cancelled")]
    Cancelled,

    /// Malformed URL, unknown rule type, out-of-range score. Returned
    /// synchronously to the caller; nothing is persisted.
    #[error("bad input: {0}")]
    BadInput(String),
}

impl CrawlError {
    /// Whether a retry with backoff is worth attempting.
    pub fn is_transient(&self) -> bool {
        match self {
            CrawlError::Network(_) | CrawlError::Timeout(_) => true,
            CrawlError::HttpStatus(code) => *code >= 500,
            _ => false,
        }
    }

    /// Bucket used for per-job error counters (`metrics.errors`).
    pub fn class(&self) -> &'static str {
        match self {
            CrawlError::Network(_) => "network",
            CrawlError::Timeout(_) => "timeout",
            CrawlError::HttpStatus(code) if *code >= 500 => "network",
            CrawlError::HttpStatus(_) => "http",
            CrawlError::TooManyRedirects(_) | CrawlError::RedirectLoop(_) => "redirect",
            CrawlError::RobotsDisallowed(_) | CrawlError::HostBlacklisted(_) => "policy",
            CrawlError::BodyTooLarge { .. } => "oversize",
            CrawlError::ParseFailed(_) => "parse",
            CrawlError::StoreUnavailable(_) => "store",
            CrawlError::QuotaExhausted(_) => "quota",
            CrawlError::Cancelled => "cancelled",
            CrawlError::BadInput(_) => "bad-input",
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
