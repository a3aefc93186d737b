use super::common::{self, HandlerResult};
use crate::core::types::{CategorizationRule, RuleType};
use crate::core::Core;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn handle(core: Arc<Core>, arguments: &Value) -> HandlerResult {
    let rule_name = common::require_str(arguments, "rule_name")?;
    let rule_type_raw = common::require_str(arguments, "rule_type")?;
    let pattern = common::require_str(arguments, "pattern")?;
    let category = common::require_str(arguments, "category")?;

    let rule_type = RuleType::parse_str(rule_type_raw).ok_or_else(|| {
        common::bad_request(format!(
            "unknown rule_type '{}' (expected keyword, regex, structure, or semantic)",
            rule_type_raw
        ))
    })?;

    let confidence_boost = common::opt_f64(arguments, "confidence_boost").unwrap_or(0.1);
    if !(-1.0..=1.0).contains(&confidence_boost) {
        return Err(common::bad_request("confidence_boost must be within [-1, 1]"));
    }
    let priority = common::opt_usize(arguments, "priority").unwrap_or(5) as i64;

    if rule_type == RuleType::Regex {
        if let Err(e) = regex::Regex::new(pattern) {
            return Err(common::bad_request(format!("invalid regex pattern: {}", e)));
        }
    }

    let rule = CategorizationRule {
        rule_name: rule_name.to_string(),
        rule_type,
        pattern: pattern.to_string(),
        category: category.to_string(),
        subcategory: common::opt_str(arguments, "subcategory"),
        confidence_boost,
        priority,
        active: true,
        created_at: Utc::now(),
    };

    core.store.insert_rule(&rule).await.map_err(common::core_error)?;
    core.reload_rules().await.map_err(common::core_error)?;

    Ok(common::json_response(&json!({
        "rule_name": rule_name,
        "message": format!("categorization rule '{}' added", rule_name),
    })))
}
