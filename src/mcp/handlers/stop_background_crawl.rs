use super::common::{self, HandlerResult};
use crate::core::Core;
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn handle(core: Arc<Core>, arguments: &Value) -> HandlerResult {
    let job_id = common::require_str(arguments, "job_id")?;

    let state = core
        .scheduler()
        .cancel(job_id)
        .await
        .map_err(common::core_error)?;

    Ok(common::json_response(&json!({
        "job_id": job_id,
        "state": state.as_str(),
        "message": "cancellation requested",
    })))
}
