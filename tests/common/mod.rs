//! Shared fixtures: an in-process site for the crawler to walk and a
//! fully wired core over an in-memory store.
#![allow(dead_code)]

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use lorecrawl::core::config::{LoreConfig, SearchSection};
use lorecrawl::{Core, Scheduler, SchedulerConfig};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

type Hits = Arc<Mutex<Vec<(String, Instant)>>>;

#[derive(Clone)]
struct SiteState {
    pages: Arc<HashMap<String, String>>,
    hits: Hits,
}

pub struct FixtureSite {
    pub addr: SocketAddr,
    hits: Hits,
}

impl FixtureSite {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Request paths in arrival order, robots probes filtered out.
    pub fn page_hits(&self) -> Vec<String> {
        self.hits
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path != "/robots.txt")
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Smallest gap between consecutive page fetches.
    pub fn min_gap(&self) -> Option<std::time::Duration> {
        let hits = self.hits.lock().unwrap();
        let times: Vec<Instant> = hits
            .iter()
            .filter(|(path, _)| path != "/robots.txt")
            .map(|(_, t)| *t)
            .collect();
        times
            .windows(2)
            .map(|w| w[1].duration_since(w[0]))
            .min()
    }

    pub fn clear_hits(&self) {
        self.hits.lock().unwrap().clear();
    }
}

async fn serve_page(State(state): State<SiteState>, uri: Uri) -> impl IntoResponse {
    let path = uri.path().to_string();
    state.hits.lock().unwrap().push((path.clone(), Instant::now()));

    match state.pages.get(&path) {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body.clone(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

/// Serve a map of path → HTML body on an ephemeral local port.
pub async fn serve(pages: HashMap<String, String>) -> FixtureSite {
    let hits: Hits = Arc::new(Mutex::new(Vec::new()));
    let state = SiteState {
        pages: Arc::new(pages),
        hits: Arc::clone(&hits),
    };

    let app = Router::new().fallback(serve_page).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fixture site");
    let addr = listener.local_addr().expect("fixture site addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    FixtureSite { addr, hits }
}

/// A core over `:memory:` with search disabled (no network) and a started
/// scheduler.
pub async fn test_core(scheduler_config: SchedulerConfig) -> Arc<Core> {
    let config = LoreConfig {
        search: SearchSection {
            providers: Some(String::new()),
            ..Default::default()
        },
        ..Default::default()
    };

    let store = lorecrawl::Store::open(":memory:").await.expect("open store");
    let core = Core::new(config, store, reqwest::Client::new())
        .await
        .expect("assemble core");

    let scheduler = Scheduler::new(Arc::clone(&core), scheduler_config);
    scheduler.start();
    core.set_scheduler(scheduler);
    core
}

pub async fn default_test_core() -> Arc<Core> {
    test_core(SchedulerConfig::default()).await
}

/// Poll a job until it leaves `queued`/`running` or the deadline passes.
pub async fn wait_for_terminal(
    core: &Arc<Core>,
    job_id: &str,
    deadline: std::time::Duration,
) -> lorecrawl::JobState {
    let started = Instant::now();
    loop {
        let views = core
            .scheduler()
            .status(Some(job_id))
            .await
            .expect("job status");
        let state = views[0].state;
        if !matches!(state, lorecrawl::JobState::Queued | lorecrawl::JobState::Running) {
            return state;
        }
        if started.elapsed() > deadline {
            return state;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}
