//! The MCP tool surface exercised end-to-end through `call_tool`.

mod common;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use lorecrawl::mcp::{call_tool, McpCallRequest, McpCallResponse};
use lorecrawl::Core;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

async fn call(core: &Arc<Core>, name: &str, arguments: Value) -> Result<Value, StatusCode> {
    let request = McpCallRequest {
        name: name.to_string(),
        arguments,
    };
    match call_tool(State(Arc::clone(core)), Json(request)).await {
        Ok(Json(McpCallResponse { content, .. })) => {
            let text = &content.first().expect("content chunk").text;
            Ok(serde_json::from_str(text).expect("JSON tool response"))
        }
        Err((status, _)) => Err(status),
    }
}

#[tokio::test]
async fn unknown_tool_is_rejected() {
    let core = common::default_test_core().await;
    let err = call(&core, "definitely_not_a_tool", json!({})).await.unwrap_err();
    assert_eq!(err, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rule_round_trip_and_duplicate_rejection() {
    let core = common::default_test_core().await;

    let added = call(
        &core,
        "add_categorization_rule",
        json!({
            "rule_name": "python-kw",
            "rule_type": "keyword",
            "pattern": "python",
            "category": "programming",
            "subcategory": "python"
        }),
    )
    .await
    .unwrap();
    assert_eq!(added["rule_name"], "python-kw");

    let listing = call(&core, "get_categorization_rules", json!({})).await.unwrap();
    assert_eq!(listing["total_rules"], 1);
    assert_eq!(listing["active_rules"], 1);
    assert_eq!(listing["rules"][0]["rule_name"], "python-kw");

    // Same name again: synchronous BadInput, nothing persisted twice.
    let dup = call(
        &core,
        "add_categorization_rule",
        json!({
            "rule_name": "python-kw",
            "rule_type": "keyword",
            "pattern": "python3",
            "category": "programming"
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(dup, StatusCode::BAD_REQUEST);

    let unknown_type = call(
        &core,
        "add_categorization_rule",
        json!({
            "rule_name": "other",
            "rule_type": "oracle",
            "pattern": "x",
            "category": "y"
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(unknown_type, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn crawl_then_query_and_search_bits() {
    let site = common::serve(HashMap::from([(
        "/learn".to_string(),
        "<h1>Borrowing</h1><p>Borrowing lets code use a value without taking ownership.</p>"
            .to_string(),
    )]))
    .await;
    let core = common::default_test_core().await;

    let outcome = call(
        &core,
        "crawl_website",
        json!({
            "url": site.url("/learn"),
            "max_pages": 1,
            "max_depth": 0,
            "crawl_delay": 0.0
        }),
    )
    .await
    .unwrap();
    assert_eq!(outcome["state"], "completed");
    assert_eq!(outcome["pages_crawled"], 1);
    assert_eq!(outcome["bits_extracted"], 1);

    let bits = call(&core, "get_learning_bits", json!({"limit": 10})).await.unwrap();
    assert_eq!(bits["total_found"], 1);
    let bit = &bits["learning_bits"][0];
    assert_eq!(bit["content_type"], "concept");
    assert!(bit["source_url"].as_str().unwrap().contains("/learn"));

    let found = call(
        &core,
        "search_learning_bits",
        json!({"query": "ownership borrowing"}),
    )
    .await
    .unwrap();
    assert_eq!(found["total_results"], 1);
    let relevance = found["results"][0]["relevance_score"].as_f64().unwrap();
    assert!(relevance > 0.0 && relevance <= 1.0);

    let stats = call(&core, "get_learning_statistics", json!({})).await.unwrap();
    assert_eq!(stats["total_learning_bits"], 1);
    assert_eq!(stats["total_crawled_pages"], 1);
    assert_eq!(stats["content_type_distribution"]["concept"], 1);
}

#[tokio::test]
async fn background_crawl_lifecycle_via_tools() {
    let site = common::serve(HashMap::from([(
        "/".to_string(),
        "<h1>Bg</h1><p>Background crawl target page.</p>".to_string(),
    )]))
    .await;
    let core = common::default_test_core().await;

    let ack = call(
        &core,
        "start_background_crawl",
        json!({
            "job_id": "bg-1",
            "seed_url": site.url("/"),
            "config": {"max_pages": 1, "max_depth": 0, "crawl_delay": 0.0}
        }),
    )
    .await
    .unwrap();
    assert_eq!(ack["job_id"], "bg-1");
    assert_eq!(ack["state"], "queued");

    let state = common::wait_for_terminal(&core, "bg-1", std::time::Duration::from_secs(10)).await;
    assert_eq!(state, lorecrawl::JobState::Completed);

    let status = call(&core, "get_background_crawl_status", json!({"job_id": "bg-1"}))
        .await
        .unwrap();
    assert_eq!(status["state"], "completed");
    assert_eq!(status["metrics"]["pages_fetched"], 1);

    let aggregate = call(&core, "get_background_crawl_status", json!({})).await.unwrap();
    assert_eq!(aggregate["total_jobs"], 1);
    assert_eq!(aggregate["completed"], 1);
}

#[tokio::test]
async fn stop_background_crawl_cancels() {
    let links: String = (1..=10)
        .map(|i| format!(r##"<a href="/q{}">q{}</a>"##, i, i))
        .collect();
    let mut pages = HashMap::from([(
        "/".to_string(),
        format!("<h1>Hub</h1><p>Cancellable crawl hub.</p>{}", links),
    )]);
    for i in 1..=10 {
        pages.insert(
            format!("/q{}", i),
            format!("<h1>Q{}</h1><p>Page number {} content.</p>", i, i),
        );
    }
    let site = common::serve(pages).await;
    let core = common::default_test_core().await;

    call(
        &core,
        "start_background_crawl",
        json!({
            "job_id": "bg-slow",
            "seed_url": site.url("/"),
            "config": {"crawl_delay": 0.5}
        }),
    )
    .await
    .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let ack = call(&core, "stop_background_crawl", json!({"job_id": "bg-slow"}))
        .await
        .unwrap();
    assert_eq!(ack["job_id"], "bg-slow");

    let state = common::wait_for_terminal(&core, "bg-slow", std::time::Duration::from_secs(5)).await;
    assert_eq!(state, lorecrawl::JobState::Cancelled);
}

#[tokio::test]
async fn search_web_without_providers_reports_fallback() {
    let core = common::default_test_core().await;
    let response = call(&core, "search_web", json!({"query": "anything", "max_results": 10}))
        .await
        .unwrap();
    assert_eq!(response["results"].as_array().unwrap().len(), 0);
    assert_eq!(response["reason"], "no providers");
}

#[tokio::test]
async fn crawl_website_requires_url() {
    let core = common::default_test_core().await;
    let err = call(&core, "crawl_website", json!({})).await.unwrap_err();
    assert_eq!(err, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn classification_follows_rule_priority_end_to_end() {
    // Two rules, both matching the page's candidate: the regex rule has
    // the lower priority value and must win the classification.
    let site = common::serve(HashMap::from([(
        "/code".to_string(),
        "<h1>Sample</h1><p>A python snippet shows function greet() in action today.</p>"
            .to_string(),
    )]))
    .await;
    let core = common::default_test_core().await;

    call(
        &core,
        "add_categorization_rule",
        json!({
            "rule_name": "py",
            "rule_type": "keyword",
            "pattern": "python",
            "category": "programming",
            "subcategory": "python",
            "priority": 2
        }),
    )
    .await
    .unwrap();
    call(
        &core,
        "add_categorization_rule",
        json!({
            "rule_name": "js-func",
            "rule_type": "regex",
            "pattern": r"function\s+\w+",
            "category": "programming",
            "subcategory": "js",
            "priority": 1
        }),
    )
    .await
    .unwrap();

    call(
        &core,
        "crawl_website",
        json!({"url": site.url("/code"), "max_pages": 1, "max_depth": 0, "crawl_delay": 0.0}),
    )
    .await
    .unwrap();

    let bits = call(&core, "get_learning_bits", json!({"limit": 10})).await.unwrap();
    assert_eq!(bits["total_found"], 1);
    assert_eq!(bits["learning_bits"][0]["subcategory"], "js");
    // The losing rule still contributes its tag.
    let tags: Vec<String> = bits["learning_bits"][0]["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert!(tags.contains(&"python".to_string()));
}
