use std::path::PathBuf;

// ---------------------------------------------------------------------------
// LoreConfig — file-based config loader (lorecrawl.json) with env-var fallback
// ---------------------------------------------------------------------------

/// Crawler sub-config (mirrors the `crawler` key in lorecrawl.json).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct CrawlerSection {
    /// Hard cap of pages per crawl job. Default: 50.
    pub max_pages: Option<usize>,
    /// Max BFS depth for link following. Default: 3.
    pub max_depth: Option<usize>,
    /// Minimum seconds between fetches to the same host. Default: 1.0.
    pub crawl_delay: Option<f64>,
    /// Toggle robots.txt enforcement. Default: true.
    pub respect_robots: Option<bool>,
    /// Per-request network deadline in seconds. Default: 30.
    pub fetch_timeout: Option<u64>,
}

impl CrawlerSection {
    pub fn resolve_max_pages(&self) -> usize {
        self.max_pages
            .or_else(|| env_parse("LORECRAWL_MAX_PAGES"))
            .unwrap_or(50)
    }

    pub fn resolve_max_depth(&self) -> usize {
        self.max_depth
            .or_else(|| env_parse("LORECRAWL_MAX_DEPTH"))
            .unwrap_or(3)
    }

    pub fn resolve_crawl_delay(&self) -> f64 {
        self.crawl_delay
            .or_else(|| env_parse("LORECRAWL_CRAWL_DELAY"))
            .unwrap_or(1.0)
    }

    pub fn resolve_respect_robots(&self) -> bool {
        self.respect_robots
            .or_else(|| env_parse("LORECRAWL_RESPECT_ROBOTS"))
            .unwrap_or(true)
    }

    pub fn resolve_fetch_timeout_secs(&self) -> u64 {
        self.fetch_timeout
            .or_else(|| env_parse("LORECRAWL_FETCH_TIMEOUT_SECS"))
            .unwrap_or(30)
    }
}

/// Scheduler sub-config (mirrors the `scheduler` key in lorecrawl.json).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct SchedulerSection {
    /// Worker pool size — caps in-flight crawl jobs. Default: 3.
    pub max_concurrent_tasks: Option<usize>,
    /// Per-job deadline in seconds. Default: 300.
    pub task_timeout: Option<u64>,
    /// Max retries on timeout or transient failure. Default: 3.
    pub retry_attempts: Option<u32>,
}

impl SchedulerSection {
    pub fn resolve_max_concurrent_tasks(&self) -> usize {
        self.max_concurrent_tasks
            .or_else(|| env_parse("LORECRAWL_MAX_CONCURRENT_TASKS"))
            .unwrap_or(3)
            .max(1)
    }

    pub fn resolve_task_timeout_secs(&self) -> u64 {
        self.task_timeout
            .or_else(|| env_parse("LORECRAWL_TASK_TIMEOUT_SECS"))
            .unwrap_or(300)
    }

    pub fn resolve_retry_attempts(&self) -> u32 {
        self.retry_attempts
            .or_else(|| env_parse("LORECRAWL_RETRY_ATTEMPTS"))
            .unwrap_or(3)
    }
}

/// Search sub-config (mirrors the `search` key in lorecrawl.json).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct SearchSection {
    /// Comma-separated provider list. Empty string disables search
    /// entirely (fallback mode). Default: "duckduckgo,brave".
    pub providers: Option<String>,
    /// Min relevance a result needs to survive filtering. Default: 0.2.
    pub result_filtering_threshold: Option<f64>,
    /// Per-provider hourly request cap. Default: 100.
    pub search_rate_limit: Option<u32>,
    /// Whole-dispatch deadline in milliseconds. Default: 5000.
    pub deadline_ms: Option<u64>,
    /// Enqueue discovered URLs as low-priority crawl jobs. Default: false.
    pub enqueue_discovered: Option<bool>,
}

impl SearchSection {
    pub fn resolve_providers(&self) -> Vec<String> {
        let raw = self
            .providers
            .clone()
            .or_else(|| std::env::var("SEARCH_PROVIDERS").ok())
            .unwrap_or_else(|| "duckduckgo,brave".to_string());
        raw.split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn resolve_filtering_threshold(&self) -> f64 {
        self.result_filtering_threshold
            .or_else(|| env_parse("SEARCH_RESULT_FILTERING_THRESHOLD"))
            .unwrap_or(0.2)
    }

    pub fn resolve_rate_limit(&self) -> u32 {
        self.search_rate_limit
            .or_else(|| env_parse("SEARCH_RATE_LIMIT"))
            .unwrap_or(100)
    }

    pub fn resolve_deadline_ms(&self) -> u64 {
        self.deadline_ms
            .or_else(|| env_parse("SEARCH_DEADLINE_MS"))
            .unwrap_or(5_000)
    }

    pub fn resolve_enqueue_discovered(&self) -> bool {
        self.enqueue_discovered
            .or_else(|| env_parse("SEARCH_ENQUEUE_DISCOVERED"))
            .unwrap_or(false)
    }
}

/// Top-level config loaded from `lorecrawl.json`.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct LoreConfig {
    #[serde(default)]
    pub crawler: CrawlerSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub search: SearchSection,
}

/// Load `lorecrawl.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `LORECRAWL_CONFIG` env var path
/// 2. `./lorecrawl.json`  (process cwd)
/// 3. `../lorecrawl.json` (repo root when running from a subdir)
///
/// Missing file → `LoreConfig::default()` (silent, all env-var fallbacks
/// apply). Parse error → log a warning, return defaults.
pub fn load_lore_config() -> LoreConfig {
    let mut candidates = vec![
        PathBuf::from("lorecrawl.json"),
        PathBuf::from("../lorecrawl.json"),
    ];
    if let Ok(env_path) = std::env::var("LORECRAWL_CONFIG") {
        candidates.insert(0, PathBuf::from(env_path));
    }

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<LoreConfig>(&contents) {
                Ok(cfg) => {
                    tracing::info!("lorecrawl.json loaded from {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        "lorecrawl.json parse error at {}: {} — using defaults",
                        path.display(),
                        e
                    );
                    return LoreConfig::default();
                }
            },
            Err(_) => continue,
        }
    }

    LoreConfig::default()
}

// ---------------------------------------------------------------------------

pub const ENV_DB_PATH: &str = "LORECRAWL_DB_PATH";

/// Path of the learning store database file.
///
/// `LORECRAWL_DB_PATH` wins when set (the literal `:memory:` is honored for
/// ephemeral runs); otherwise a stable per-user default under
/// `~/.lorecrawl/lorecrawl.db` so extracted knowledge survives restarts.
pub fn db_path() -> String {
    if let Ok(v) = std::env::var(ENV_DB_PATH) {
        let v = v.trim().to_string();
        if !v.is_empty() {
            return v;
        }
    }
    match dirs::home_dir() {
        Some(home) => home
            .join(".lorecrawl")
            .join("lorecrawl.db")
            .to_string_lossy()
            .to_string(),
        None => "lorecrawl.db".to_string(),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
