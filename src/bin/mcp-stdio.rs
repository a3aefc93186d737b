//! JSON-RPC 2.0 stdio entry point for MCP clients.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lorecrawl::mcp::stdio::run().await
}
