//! Adaptive threshold behavior across a real crawl: a corpus where nearly
//! every candidate clears the bar must raise the stored threshold by
//! exactly one bounded step.

mod common;

use lorecrawl::core::types::JobPriority;
use lorecrawl::{CrawlConfig, JobSpec, JobState};
use std::collections::HashMap;

const FILLER: &str = "this entry explains a distinct practical idea in enough words to sit \
    comfortably inside the ideal content length band for scoring, covering background, a \
    worked explanation, and a short closing remark about when the idea applies in practice";

fn rich_page(items: usize) -> String {
    let list: String = (0..items)
        .map(|i| format!("<li>Entry number {} of the handbook: {}.</li>", i, FILLER))
        .collect();
    format!(
        "<h1>Handbook</h1><p>A long handbook of distinct practical entries follows.</p><ul>{}</ul>",
        list
    )
}

#[tokio::test]
async fn high_scoring_corpus_raises_importance_threshold_by_one_step() {
    let site = common::serve(HashMap::from([("/handbook".to_string(), rich_page(120))])).await;
    let core = common::default_test_core().await;

    let before = core.store.get_thresholds().await.unwrap();

    let outcome = core
        .scheduler()
        .run_inline(JobSpec {
            job_id: None,
            seed_url: site.url("/handbook"),
            config: CrawlConfig {
                max_pages: 1,
                max_depth: 0,
                crawl_delay: 0.0,
                ..Default::default()
            },
            priority: JobPriority::Normal,
        })
        .await
        .unwrap();

    assert_eq!(outcome.state, JobState::Completed);
    assert!(
        outcome.bits_extracted >= 100,
        "need at least one full adaptation window, got {} bits",
        outcome.bits_extracted
    );

    let after = core.store.get_thresholds().await.unwrap();
    assert!(
        (after.min_importance_to_store - (before.min_importance_to_store + 0.05)).abs() < 1e-9,
        "expected exactly +0.05, went from {} to {}",
        before.min_importance_to_store,
        after.min_importance_to_store
    );
    // Bounded step property: no threshold ever moves more than 0.05.
    assert!(
        (after.min_confidence_to_store - before.min_confidence_to_store).abs() <= 0.05 + 1e-9
    );

    // The shared in-memory copy matches what was persisted.
    let shared = core.thresholds().await;
    assert!((shared.min_importance_to_store - after.min_importance_to_store).abs() < 1e-9);
}
