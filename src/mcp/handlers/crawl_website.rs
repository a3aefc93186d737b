use super::common::{self, HandlerResult};
use crate::core::types::JobPriority;
use crate::core::Core;
use crate::crawler::CrawlConfig;
use crate::scheduler::JobSpec;
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

pub async fn handle(core: Arc<Core>, arguments: &Value) -> HandlerResult {
    let url = common::require_str(arguments, "url")?;

    let defaults = &core.config.crawler;
    let config = CrawlConfig {
        max_pages: common::opt_usize(arguments, "max_pages")
            .unwrap_or_else(|| defaults.resolve_max_pages()),
        max_depth: common::opt_usize(arguments, "max_depth")
            .unwrap_or_else(|| defaults.resolve_max_depth()),
        follow_links: common::opt_bool(arguments, "follow_links").unwrap_or(true),
        crawl_delay: common::opt_f64(arguments, "crawl_delay")
            .unwrap_or_else(|| defaults.resolve_crawl_delay()),
        respect_robots: common::opt_bool(arguments, "respect_robots")
            .unwrap_or_else(|| defaults.resolve_respect_robots()),
        same_host_only: common::opt_bool(arguments, "same_host_only").unwrap_or(true),
        allow_hosts: Vec::new(),
        deny_hosts: Vec::new(),
    };

    let spec = JobSpec {
        job_id: None,
        seed_url: url.to_string(),
        config,
        priority: JobPriority::Normal,
    };

    match core.scheduler().run_inline(spec).await {
        Ok(outcome) => Ok(common::json_response(&outcome)),
        Err(e) => {
            error!("crawl_website failed: {}", e);
            Err(common::core_error(e))
        }
    }
}
