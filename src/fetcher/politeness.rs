use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Per-host fetch spacing.
///
/// Each host gets a reservation slot: callers atomically claim the next
/// allowed fetch time and then sleep until it arrives, so two tasks hitting
/// the same host can never observe less than `min_delay` between requests.
#[derive(Default)]
pub struct HostLedger {
    next_allowed: Mutex<HashMap<String, Instant>>,
}

impl HostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend until this host may be fetched again, honoring `min_delay`
    /// since the previous reservation. Returns immediately for a host's
    /// first fetch.
    pub async fn wait_turn(&self, host: &str, min_delay: Duration) {
        let slot = {
            let mut ledger = self.next_allowed.lock().await;
            let now = Instant::now();
            let slot = match ledger.get(host) {
                Some(prev) => (*prev + min_delay).max(now),
                None => now,
            };
            ledger.insert(host.to_string(), slot);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}
