use super::handlers;
use crate::core::types::ErrorResponse;
use crate::core::Core;
use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub title: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpToolsResponse {
    pub tools: Vec<McpTool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpCallRequest {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpCallResponse {
    pub content: Vec<McpContent>,
    pub is_error: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

pub fn list_tools() -> McpToolsResponse {
    let tools = super::tooling::tool_catalog()
        .into_iter()
        .map(|entry| McpTool {
            name: entry.name.to_string(),
            title: entry.title.to_string(),
            description: entry.description.to_string(),
            input_schema: entry.input_schema,
        })
        .collect();
    McpToolsResponse { tools }
}

pub async fn list_tools_handler(State(_state): State<Arc<Core>>) -> Json<McpToolsResponse> {
    Json(list_tools())
}

pub async fn call_tool(
    State(core): State<Arc<Core>>,
    Json(request): Json<McpCallRequest>,
) -> Result<Json<McpCallResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!("tool call: {}", request.name);
    let args = &request.arguments;

    match request.name.as_str() {
        "crawl_website" => handlers::crawl_website::handle(core, args).await,
        "start_background_crawl" => handlers::start_background_crawl::handle(core, args).await,
        "get_background_crawl_status" => {
            handlers::get_background_crawl_status::handle(core, args).await
        }
        "stop_background_crawl" => handlers::stop_background_crawl::handle(core, args).await,
        "get_learning_bits" => handlers::get_learning_bits::handle(core, args).await,
        "search_learning_bits" => handlers::search_learning_bits::handle(core, args).await,
        "get_learning_statistics" => handlers::get_learning_statistics::handle(core, args).await,
        "add_categorization_rule" => handlers::add_categorization_rule::handle(core, args).await,
        "get_categorization_rules" => handlers::get_categorization_rules::handle(core, args).await,
        "search_web" => handlers::search_web::handle(core, args).await,
        other => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Unknown tool: {}", other),
            }),
        )),
    }
}
