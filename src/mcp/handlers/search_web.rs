use super::common::{self, HandlerResult};
use crate::core::types::JobPriority;
use crate::core::Core;
use crate::scheduler::JobSpec;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub async fn handle(core: Arc<Core>, arguments: &Value) -> HandlerResult {
    let query = common::require_str(arguments, "query")?;
    let max_results = common::opt_usize(arguments, "max_results").unwrap_or(10).min(100);

    let response = core
        .search
        .search(query, max_results)
        .await
        .map_err(common::core_error)?;

    // The search log is diagnostics, never a reason to fail the query.
    if let Err(e) = core.store.record_search(query, &response.results).await {
        warn!("failed to log search: {}", e);
    }

    if core.config.search.resolve_enqueue_discovered() && !response.results.is_empty() {
        let scheduler = core.scheduler();
        for result in &response.results {
            let spec = JobSpec {
                job_id: None,
                seed_url: result.url.clone(),
                config: Default::default(),
                priority: JobPriority::Low,
            };
            match scheduler.submit(spec).await {
                Ok(job_id) => debug!("discovered url {} queued as job {}", result.url, job_id),
                Err(e) => debug!("skipping discovered url {}: {}", result.url, e),
            }
        }
    }

    Ok(common::json_response(&response))
}
