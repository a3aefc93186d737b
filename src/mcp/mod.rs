pub mod handlers;
pub mod http;
pub mod stdio;
pub mod tooling;

pub use http::{
    call_tool, list_tools, list_tools_handler, McpCallRequest, McpCallResponse, McpContent,
    McpTool, McpToolsResponse,
};
