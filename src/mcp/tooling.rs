use serde_json::Value;

#[derive(Clone, Debug)]
pub struct ToolCatalogEntry {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub fn tool_catalog() -> Vec<ToolCatalogEntry> {
    vec![
        ToolCatalogEntry {
            name: "crawl_website",
            title: "Crawl Website",
            description: "Crawl a website starting from a URL, extract learning bits, categorize and score them, and store everything for later retrieval. Blocks until the crawl finishes.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string"},
                    "max_pages": {"type": "integer", "minimum": 1},
                    "max_depth": {"type": "integer", "minimum": 0},
                    "follow_links": {"type": "boolean", "default": true},
                    "crawl_delay": {"type": "number", "minimum": 0},
                    "respect_robots": {"type": "boolean", "default": true},
                    "same_host_only": {"type": "boolean", "default": true}
                },
                "required": ["url"]
            }),
        },
        ToolCatalogEntry {
            name: "start_background_crawl",
            title: "Start Background Crawl",
            description: "Enqueue a crawl job that runs in the background without blocking. Returns immediately with the queued job id.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "job_id": {"type": "string"},
                    "seed_url": {"type": "string"},
                    "priority": {"type": "string", "enum": ["critical", "high", "normal", "low"], "default": "normal"},
                    "config": {"type": "object"}
                },
                "required": ["seed_url"]
            }),
        },
        ToolCatalogEntry {
            name: "get_background_crawl_status",
            title: "Background Crawl Status",
            description: "Status of one background crawl job, or an aggregate view of all known jobs when no id is given.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "job_id": {"type": "string"}
                }
            }),
        },
        ToolCatalogEntry {
            name: "stop_background_crawl",
            title: "Stop Background Crawl",
            description: "Request cooperative cancellation of a background crawl job. The job stops at its next suspension point.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "job_id": {"type": "string"}
                },
                "required": ["job_id"]
            }),
        },
        ToolCatalogEntry {
            name: "get_learning_bits",
            title: "Get Learning Bits",
            description: "Retrieve stored learning bits filtered by category, content type, complexity, and minimum importance.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "category": {"type": "string"},
                    "subcategory": {"type": "string"},
                    "content_type": {"type": "string", "enum": ["concept", "definition", "example", "tutorial-step", "code", "reference", "other"]},
                    "complexity_level": {"type": "string", "enum": ["beginner", "intermediate", "advanced"]},
                    "min_importance": {"type": "number", "minimum": 0, "maximum": 1, "default": 0},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 200, "default": 20},
                    "offset": {"type": "integer", "minimum": 0, "default": 0}
                }
            }),
        },
        ToolCatalogEntry {
            name: "search_learning_bits",
            title: "Search Learning Bits",
            description: "Full-text search through stored learning bits, ranked by relevance, importance, and confidence.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "category": {"type": "string"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 100, "default": 20}
                },
                "required": ["query"]
            }),
        },
        ToolCatalogEntry {
            name: "get_learning_statistics",
            title: "Learning Statistics",
            description: "Aggregate statistics over the learning store: counts by category, content type and complexity, top domains, average scores, and recent activity.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolCatalogEntry {
            name: "add_categorization_rule",
            title: "Add Categorization Rule",
            description: "Create a classification rule (keyword, regex, structure, or semantic) used to categorize newly extracted learning bits.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "rule_name": {"type": "string"},
                    "rule_type": {"type": "string", "enum": ["keyword", "regex", "structure", "semantic"]},
                    "pattern": {"type": "string"},
                    "category": {"type": "string"},
                    "subcategory": {"type": "string"},
                    "confidence_boost": {"type": "number", "minimum": -1, "maximum": 1, "default": 0.1},
                    "priority": {"type": "integer", "minimum": 1, "default": 5}
                },
                "required": ["rule_name", "rule_type", "pattern", "category"]
            }),
        },
        ToolCatalogEntry {
            name: "get_categorization_rules",
            title: "List Categorization Rules",
            description: "List every categorization rule with its pattern, priority, and active flag.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolCatalogEntry {
            name: "search_web",
            title: "Web Search",
            description: "Fan a query out to the configured search providers in parallel and return a deduplicated, relevance-scored result list.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "max_results": {"type": "integer", "minimum": 1, "maximum": 100, "default": 10}
                },
                "required": ["query"]
            }),
        },
    ]
}
