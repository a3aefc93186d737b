use crate::classify::RuleSet;
use crate::core::config::LoreConfig;
use crate::core::error::Result;
use crate::core::types::AdaptiveThresholds;
use crate::fetcher::Fetcher;
use crate::search::SearchDispatcher;
use crate::store::Store;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// The explicit aggregate every operation hangs off: store, fetcher,
/// search dispatcher, and the shared rule/threshold state. Tests build an
/// isolated `Core` per case; there are no module-level singletons.
pub struct Core {
    pub store: Arc<Store>,
    pub fetcher: Arc<Fetcher>,
    pub search: SearchDispatcher,
    pub config: LoreConfig,
    /// Compiled active rules. Readers clone the Arc and classify against
    /// a stable snapshot; rule mutations swap the whole set.
    rules: RwLock<Arc<RuleSet>>,
    thresholds: RwLock<AdaptiveThresholds>,
    scheduler: OnceLock<Arc<crate::scheduler::Scheduler>>,
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("store_path", &self.store.path())
            .field("search_providers", &self.search.provider_count())
            .finish()
    }
}

impl Core {
    /// Assemble a core over an opened store. Rules and thresholds are
    /// loaded eagerly so the first classification never races a cold read.
    pub async fn new(
        config: LoreConfig,
        store: Store,
        http_client: reqwest::Client,
    ) -> Result<Arc<Self>> {
        let fetch_timeout = Duration::from_secs(config.crawler.resolve_fetch_timeout_secs());
        let fetcher = Arc::new(Fetcher::new(fetch_timeout)?);
        let search = SearchDispatcher::from_config(http_client, &config.search);

        let active_rules = store.list_rules(true).await?;
        let rule_set = Arc::new(RuleSet::compile(active_rules));
        let thresholds = store.get_thresholds().await?;

        Ok(Arc::new(Self {
            store: Arc::new(store),
            fetcher,
            search,
            config,
            rules: RwLock::new(rule_set),
            thresholds: RwLock::new(thresholds),
            scheduler: OnceLock::new(),
        }))
    }

    /// Open the configured database and assemble everything, the way the
    /// binaries boot.
    pub async fn bootstrap(config: LoreConfig) -> Result<Arc<Self>> {
        let db_path = crate::core::config::db_path();
        if let Some(parent) = std::path::Path::new(&db_path).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let store = Store::open(&db_path).await?;

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("lorecrawl/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| crate::core::error::CrawlError::Network(e.to_string()))?;

        let core = Self::new(config, store, http_client).await?;
        info!("core assembled ({:?})", core);
        Ok(core)
    }

    pub fn set_scheduler(&self, scheduler: Arc<crate::scheduler::Scheduler>) {
        let _ = self.scheduler.set(scheduler);
    }

    pub fn scheduler(&self) -> Arc<crate::scheduler::Scheduler> {
        Arc::clone(
            self.scheduler
                .get()
                .expect("scheduler attached at startup"),
        )
    }

    pub async fn rule_set(&self) -> Arc<RuleSet> {
        Arc::clone(&*self.rules.read().await)
    }

    /// Recompile the shared rule set from the store. Called after any
    /// rule mutation through the tool surface.
    pub async fn reload_rules(&self) -> Result<()> {
        let active = self.store.list_rules(true).await?;
        let compiled = Arc::new(RuleSet::compile(active));
        *self.rules.write().await = compiled;
        Ok(())
    }

    pub async fn thresholds(&self) -> AdaptiveThresholds {
        self.thresholds.read().await.clone()
    }

    /// Persist new thresholds and publish them to readers in one step.
    pub async fn apply_thresholds(&self, next: AdaptiveThresholds) -> Result<()> {
        self.store.set_thresholds(&next).await?;
        *self.thresholds.write().await = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub async fn memory_core() -> Arc<Core> {
        let store = Store::open(":memory:").await.unwrap();
        Core::new(LoreConfig::default(), store, reqwest::Client::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn rules_reload_after_insert() {
        let core = memory_core().await;
        assert!(core.rule_set().await.is_empty());

        let rule = crate::core::types::CategorizationRule {
            rule_name: "py".to_string(),
            rule_type: crate::core::types::RuleType::Keyword,
            pattern: "python".to_string(),
            category: "programming".to_string(),
            subcategory: None,
            confidence_boost: 0.1,
            priority: 5,
            active: true,
            created_at: chrono::Utc::now(),
        };
        core.store.insert_rule(&rule).await.unwrap();
        core.reload_rules().await.unwrap();
        assert!(!core.rule_set().await.is_empty());
    }

    #[tokio::test]
    async fn threshold_updates_are_shared_and_persisted() {
        let core = memory_core().await;
        let mut next = core.thresholds().await;
        next.min_importance_to_store = 0.42;
        core.apply_thresholds(next).await.unwrap();

        assert!((core.thresholds().await.min_importance_to_store - 0.42).abs() < 1e-9);
        let persisted = core.store.get_thresholds().await.unwrap();
        assert!((persisted.min_importance_to_store - 0.42).abs() < 1e-9);
    }
}
