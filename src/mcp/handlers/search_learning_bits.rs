use super::common::{self, HandlerResult};
use crate::core::types::{truncate_with_ellipsis, LearningBitView};
use crate::core::Core;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

pub async fn handle(core: Arc<Core>, arguments: &Value) -> HandlerResult {
    let query = common::require_str(arguments, "query")?;
    let category = common::opt_str(arguments, "category");
    let limit = common::opt_usize(arguments, "limit").unwrap_or(20).min(100);

    let scored = core
        .store
        .search_bits(query, category.as_deref(), limit)
        .await
        .map_err(common::core_error)?;

    let ids: Vec<String> = scored.iter().map(|(b, _)| b.bit_id.clone()).collect();
    if let Err(e) = core.store.bump_reference_counts(&ids).await {
        warn!("reference count bump failed: {}", e);
    }

    let mut results = Vec::with_capacity(scored.len());
    for (bit, relevance) in scored {
        let source_url = core
            .store
            .get_page(&bit.page_id)
            .await
            .ok()
            .flatten()
            .map(|p| p.url);
        results.push(LearningBitView {
            bit_id: bit.bit_id,
            content_type: bit.content_type,
            category: bit.category,
            subcategory: bit.subcategory,
            content: truncate_with_ellipsis(&bit.content, 400),
            context: truncate_with_ellipsis(&bit.context, 200),
            complexity_level: bit.complexity_level,
            importance_score: bit.importance_score,
            confidence_score: bit.confidence_score,
            relevance_score: Some(relevance),
            source_url,
            tags: bit.tags,
            extracted_at: bit.extracted_at,
            reference_count: bit.reference_count,
        });
    }

    Ok(common::json_response(&json!({
        "query": query,
        "category_filter": category,
        "total_results": results.len(),
        "results": results,
    })))
}
