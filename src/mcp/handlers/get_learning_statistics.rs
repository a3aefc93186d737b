use super::common::{self, HandlerResult};
use crate::core::Core;
use serde_json::Value;
use std::sync::Arc;

pub async fn handle(core: Arc<Core>, _arguments: &Value) -> HandlerResult {
    let stats = core
        .store
        .learning_statistics()
        .await
        .map_err(common::core_error)?;
    Ok(common::json_response(&stats))
}
