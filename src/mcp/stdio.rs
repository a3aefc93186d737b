use crate::core::config::load_lore_config;
use crate::core::Core;
use crate::mcp::http::McpCallRequest;
use crate::scheduler::{Scheduler, SchedulerConfig};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use rmcp::{model::*, ServiceExt};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Clone, Debug)]
pub struct McpService {
    pub core: Arc<Core>,
}

impl McpService {
    pub async fn new() -> anyhow::Result<Self> {
        // stdout carries the protocol; logs go to stderr.
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init()
            .ok();

        let config = load_lore_config();
        let scheduler_config = SchedulerConfig {
            max_concurrent_tasks: config.scheduler.resolve_max_concurrent_tasks(),
            task_timeout: Duration::from_secs(config.scheduler.resolve_task_timeout_secs()),
            retry_attempts: config.scheduler.resolve_retry_attempts(),
        };

        let core = Core::bootstrap(config).await?;
        let scheduler = Scheduler::new(Arc::clone(&core), scheduler_config);
        scheduler.start();
        core.set_scheduler(scheduler);

        info!("MCP stdio service initialized");
        Ok(Self { core })
    }
}

impl rmcp::ServerHandler for McpService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_protocol_version(ProtocolVersion::LATEST)
            .with_server_info(Implementation::new(
                "lorecrawl",
                env!("CARGO_PKG_VERSION").to_string(),
            ))
            .with_instructions(
                "A self-learning knowledge crawler: crawl websites into categorized, scored \
                 learning bits, query and search the accumulated knowledge, manage \
                 categorization rules, schedule background crawls, and fan searches out to \
                 multiple web search providers.",
            )
    }

    async fn list_tools(
        &self,
        _page: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let tools = crate::mcp::tooling::tool_catalog()
            .into_iter()
            .map(|entry| {
                let mut tool = Tool::default();
                tool.name = Cow::Borrowed(entry.name);
                tool.description = Some(Cow::Borrowed(entry.description));
                tool.input_schema = match entry.input_schema {
                    serde_json::Value::Object(map) => Arc::new(map),
                    _ => Arc::new(serde_json::Map::new()),
                };
                tool
            })
            .collect();

        Ok(ListToolsResult {
            tools,
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        info!("MCP tool call: {}", request.name);

        let arguments = serde_json::Value::Object(request.arguments.clone().unwrap_or_default());
        let call = McpCallRequest {
            name: request.name.to_string(),
            arguments,
        };

        // Same dispatch as the HTTP surface; only the envelope differs.
        let result =
            crate::mcp::http::call_tool(State(Arc::clone(&self.core)), Json(call)).await;
        match result {
            Ok(Json(response)) => {
                let content = response
                    .content
                    .into_iter()
                    .map(|chunk| Content::text(chunk.text))
                    .collect();
                Ok(CallToolResult::success(content))
            }
            Err((status, Json(err))) => {
                let code = match status {
                    StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                        ErrorCode::INVALID_PARAMS
                    }
                    StatusCode::NOT_FOUND => ErrorCode::METHOD_NOT_FOUND,
                    _ => ErrorCode::INTERNAL_ERROR,
                };
                Err(ErrorData::new(code, err.error, None))
            }
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    let service = McpService::new().await?;
    let server = service.serve(rmcp::transport::stdio()).await?;
    info!("MCP stdio server running");
    let _quit_reason = server.waiting().await?;
    Ok(())
}
