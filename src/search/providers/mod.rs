//! Provider adapter contract for the fan-out search dispatcher.

pub mod brave;
pub mod duckduckgo;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// One raw result from a single provider, before dedup and scoring.
#[derive(Debug, Clone)]
pub struct ProviderResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// 1-based position on the provider's result page.
    pub rank: usize,
}

/// Interchangeable search backend. Implementations must be cheap to call
/// concurrently; the dispatcher owns timeouts and quotas.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Relative weight of this provider's results in relevance scoring.
    fn trust(&self) -> f64 {
        0.5
    }

    async fn query(
        &self,
        client: &reqwest::Client,
        text: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ProviderResult>>;
}

/// Fixed-window hourly request budget per provider.
pub struct HourlyQuota {
    limit: u32,
    windows: Mutex<HashMap<String, (Instant, u32)>>,
}

impl HourlyQuota {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Take one request slot for `provider`; false means the provider is
    /// out of budget for the current window and is skipped, not failed.
    pub async fn try_acquire(&self, provider: &str) -> bool {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();
        let entry = windows.entry(provider.to_string()).or_insert((now, 0));

        if now.duration_since(entry.0) >= Duration::from_secs(3600) {
            *entry = (now, 0);
        }
        if entry.1 >= self.limit {
            return false;
        }
        entry.1 += 1;
        true
    }

    pub async fn remaining(&self, provider: &str) -> u32 {
        let windows = self.windows.lock().await;
        match windows.get(provider) {
            Some((start, used)) if start.elapsed() < Duration::from_secs(3600) => {
                self.limit.saturating_sub(*used)
            }
            _ => self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn quota_exhausts_then_blocks() {
        let quota = HourlyQuota::new(2);
        assert!(quota.try_acquire("ddg").await);
        assert!(quota.try_acquire("ddg").await);
        assert!(!quota.try_acquire("ddg").await);
        assert_eq!(quota.remaining("ddg").await, 0);
        // Budgets are per provider.
        assert!(quota.try_acquire("brave").await);
    }
}
