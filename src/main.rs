use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use lorecrawl::core::config::load_lore_config;
use lorecrawl::{Core, Scheduler, SchedulerConfig};

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--port" {
            if let Some(v) = args.next() {
                if let Ok(p) = v.parse::<u16>() {
                    return Some(p);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--port=") {
            if let Ok(p) = rest.parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

fn port_from_env() -> Option<u16> {
    for key in ["LORECRAWL_PORT", "PORT"] {
        if let Ok(v) = std::env::var(key) {
            if let Ok(p) = v.trim().parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("starting lorecrawl server");

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

    let app = Router::new()
        .route("/health", get(health))
        .route("/mcp/tools", get(lorecrawl::mcp::list_tools_handler))
        .route("/mcp/call", post(lorecrawl::mcp::call_tool))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(core);

    let port = parse_port_from_args().or_else(port_from_env).unwrap_or(8378);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
