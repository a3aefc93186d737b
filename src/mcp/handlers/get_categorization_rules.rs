use super::common::{self, HandlerResult};
use crate::core::Core;
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn handle(core: Arc<Core>, _arguments: &Value) -> HandlerResult {
    let rules = core
        .store
        .list_rules(false)
        .await
        .map_err(common::core_error)?;

    let active = rules.iter().filter(|r| r.active).count();
    Ok(common::json_response(&json!({
        "total_rules": rules.len(),
        "active_rules": active,
        "rules": rules,
    })))
}
