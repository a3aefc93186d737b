use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const ROBOTS_CACHE_TTL_SECS: u64 = 3600;
const USER_AGENT_TOKEN: &str = "lorecrawl";

/// Parsed robots.txt policy for one host, reduced to the rule group that
/// applies to us (exact agent match preferred, `*` group otherwise).
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    /// (allow, path-prefix) rules from the applicable group.
    rules: Vec<(bool, String)>,
    pub crawl_delay: Option<f64>,
}

impl RobotsPolicy {
    /// Everything allowed — used when robots.txt is absent or unreadable.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn parse(body: &str) -> Self {
        #[derive(Default)]
        struct Group {
            agents: Vec<String>,
            rules: Vec<(bool, String)>,
            crawl_delay: Option<f64>,
        }

        let mut groups: Vec<Group> = Vec::new();
        let mut current = Group::default();
        let mut in_rules = false;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group.
                    if in_rules {
                        groups.push(std::mem::take(&mut current));
                        in_rules = false;
                    }
                    current.agents.push(value.to_ascii_lowercase());
                }
                "disallow" => {
                    in_rules = true;
                    if !value.is_empty() {
                        current.rules.push((false, value.to_string()));
                    }
                }
                "allow" => {
                    in_rules = true;
                    if !value.is_empty() {
                        current.rules.push((true, value.to_string()));
                    }
                }
                "crawl-delay" => {
                    in_rules = true;
                    current.crawl_delay = value.parse().ok();
                }
                _ => {}
            }
        }
        groups.push(current);

        // Exact agent group wins over the wildcard group.
        let pick = |needle: &str| {
            groups
                .iter()
                .find(|g| g.agents.iter().any(|a| a.contains(needle)))
        };
        let group = pick(USER_AGENT_TOKEN).or_else(|| pick("*"));

        match group {
            Some(g) => Self {
                rules: g.rules.clone(),
                crawl_delay: g.crawl_delay,
            },
            None => Self::allow_all(),
        }
    }

    /// Longest-prefix match decides; an `Allow` beats a `Disallow` of the
    /// same length. No rules → allowed.
    pub fn allows(&self, path: &str) -> bool {
        let mut best: Option<(usize, bool)> = None;
        for (allow, prefix) in &self.rules {
            if path.starts_with(prefix.as_str()) {
                let len = prefix.len();
                match best {
                    Some((best_len, best_allow)) => {
                        if len > best_len || (len == best_len && *allow && !best_allow) {
                            best = Some((len, *allow));
                        }
                    }
                    None => best = Some((len, *allow)),
                }
            }
        }
        best.map(|(_, allow)| allow).unwrap_or(true)
    }
}

/// Host-keyed robots.txt cache with a 1 h TTL. Misses fetch the policy
/// once; failures (network, 4xx, 5xx) cache as allow-all so a broken
/// robots endpoint never blocks a crawl.
pub struct RobotsCache {
    cache: Cache<String, Arc<RobotsPolicy>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(Duration::from_secs(ROBOTS_CACHE_TTL_SECS))
                .build(),
        }
    }

    pub async fn policy_for(
        &self,
        client: &reqwest::Client,
        scheme: &str,
        host: &str,
        port: Option<u16>,
    ) -> Arc<RobotsPolicy> {
        let key = match port {
            Some(p) => format!("{}:{}", host, p),
            None => host.to_string(),
        };
        let robots_url = match port {
            Some(p) => format!("{}://{}:{}/robots.txt", scheme, host, p),
            None => format!("{}://{}/robots.txt", scheme, host),
        };
        let client = client.clone();

        self.cache
            .get_with(key, async move {
                let policy = match client.get(&robots_url).send().await {
                    Ok(resp) if resp.status().is_success() => match resp.text().await {
                        Ok(body) => RobotsPolicy::parse(&body),
                        Err(_) => RobotsPolicy::allow_all(),
                    },
                    Ok(resp) => {
                        debug!("robots.txt at {} returned {}", robots_url, resp.status());
                        RobotsPolicy::allow_all()
                    }
                    Err(e) => {
                        debug!("robots.txt fetch failed for {}: {}", robots_url, e);
                        RobotsPolicy::allow_all()
                    }
                };
                Arc::new(policy)
            })
            .await
    }
}

impl Default for RobotsCache {
    fn default() -> Self {
        Self::new()
    }
}
