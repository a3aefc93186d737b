use super::common::{self, HandlerResult};
use crate::core::types::{
    truncate_with_ellipsis, BitFilter, ComplexityLevel, ContentType, LearningBitView,
};
use crate::core::Core;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

pub async fn handle(core: Arc<Core>, arguments: &Value) -> HandlerResult {
    let content_type = match common::opt_str(arguments, "content_type") {
        Some(raw) => Some(
            ContentType::parse_str(&raw)
                .ok_or_else(|| common::bad_request(format!("unknown content_type '{}'", raw)))?,
        ),
        None => None,
    };
    let complexity = match common::opt_str(arguments, "complexity_level") {
        Some(raw) => Some(
            ComplexityLevel::parse_str(&raw).ok_or_else(|| {
                common::bad_request(format!("unknown complexity_level '{}'", raw))
            })?,
        ),
        None => None,
    };
    if let Some(min) = common::opt_f64(arguments, "min_importance") {
        if !(0.0..=1.0).contains(&min) {
            return Err(common::bad_request("min_importance must be within [0, 1]"));
        }
    }

    let filter = BitFilter {
        category: common::opt_str(arguments, "category"),
        subcategory: common::opt_str(arguments, "subcategory"),
        content_type,
        complexity,
        min_importance: common::opt_f64(arguments, "min_importance"),
        limit: common::opt_usize(arguments, "limit").unwrap_or(20).min(200),
        offset: common::opt_usize(arguments, "offset").unwrap_or(0),
    };

    let bits = core
        .store
        .query_bits(&filter)
        .await
        .map_err(common::core_error)?;

    // Retrieval counts as a reference; failures here never fail the read.
    let ids: Vec<String> = bits.iter().map(|b| b.bit_id.clone()).collect();
    if let Err(e) = core.store.bump_reference_counts(&ids).await {
        warn!("reference count bump failed: {}", e);
    }

    let mut views = Vec::with_capacity(bits.len());
    for bit in bits {
        let source_url = core
            .store
            .get_page(&bit.page_id)
            .await
            .ok()
            .flatten()
            .map(|p| p.url);
        views.push(LearningBitView {
            bit_id: bit.bit_id,
            content_type: bit.content_type,
            category: bit.category,
            subcategory: bit.subcategory,
            content: truncate_with_ellipsis(&bit.content, 500),
            context: truncate_with_ellipsis(&bit.context, 200),
            complexity_level: bit.complexity_level,
            importance_score: bit.importance_score,
            confidence_score: bit.confidence_score,
            relevance_score: None,
            source_url,
            tags: bit.tags,
            extracted_at: bit.extracted_at,
            reference_count: bit.reference_count,
        });
    }

    Ok(common::json_response(&json!({
        "total_found": views.len(),
        "learning_bits": views,
    })))
}
