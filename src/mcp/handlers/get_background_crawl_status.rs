use super::common::{self, HandlerResult};
use crate::core::types::JobState;
use crate::core::Core;
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn handle(core: Arc<Core>, arguments: &Value) -> HandlerResult {
    let job_id = common::opt_str(arguments, "job_id");
    let views = core
        .scheduler()
        .status(job_id.as_deref())
        .await
        .map_err(common::core_error)?;

    match job_id {
        Some(_) => Ok(common::json_response(&views[0])),
        None => {
            let count_in = |state: JobState| views.iter().filter(|v| v.state == state).count();
            Ok(common::json_response(&json!({
                "total_jobs": views.len(),
                "running": count_in(JobState::Running),
                "queued": count_in(JobState::Queued),
                "completed": count_in(JobState::Completed),
                "failed": count_in(JobState::Failed),
                "cancelled": count_in(JobState::Cancelled),
                "timed_out": count_in(JobState::TimedOut),
                "jobs": views,
            })))
        }
    }
}
