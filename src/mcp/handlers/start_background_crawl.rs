use super::common::{self, HandlerResult};
use crate::core::types::JobPriority;
use crate::core::Core;
use crate::crawler::CrawlConfig;
use crate::scheduler::JobSpec;
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn handle(core: Arc<Core>, arguments: &Value) -> HandlerResult {
    let seed_url = common::require_str(arguments, "seed_url")?;

    let config: CrawlConfig = match arguments.get("config") {
        Some(raw) if !raw.is_null() => serde_json::from_value(raw.clone())
            .map_err(|e| common::bad_request(format!("invalid config: {}", e)))?,
        _ => CrawlConfig::default(),
    };

    let priority = match common::opt_str(arguments, "priority") {
        Some(raw) => JobPriority::parse_str(&raw)
            .ok_or_else(|| common::bad_request(format!("unknown priority '{}'", raw)))?,
        None => JobPriority::Normal,
    };

    let spec = JobSpec {
        job_id: common::opt_str(arguments, "job_id"),
        seed_url: seed_url.to_string(),
        config,
        priority,
    };

    let job_id = core
        .scheduler()
        .submit(spec)
        .await
        .map_err(common::core_error)?;

    Ok(common::json_response(&json!({
        "job_id": job_id,
        "state": "queued",
        "priority": priority.as_str(),
    })))
}
