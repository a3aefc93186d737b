use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Canonical form used for frontier dedup and search-result dedup:
/// lowercase host, default port dropped, fragment stripped, query pairs
/// sorted.
pub fn canonicalize(url: &Url) -> Url {
    let mut out = url.clone();
    out.set_fragment(None);

    if let Some(host) = out.host_str() {
        let lower = host.to_ascii_lowercase();
        if lower != host {
            let _ = out.set_host(Some(&lower));
        }
    }

    // `Url` already treats scheme-default ports as None; an explicit
    // default port is normalized away here.
    match (out.scheme(), out.port()) {
        ("http", Some(80)) | ("https", Some(443)) => {
            let _ = out.set_port(None);
        }
        _ => {}
    }

    if out.query().is_some() {
        let mut pairs: Vec<(String, String)> = out
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        pairs.sort();
        out.set_query(None);
        if !pairs.is_empty() {
            let mut qp = out.query_pairs_mut();
            for (k, v) in pairs {
                qp.append_pair(&k, &v);
            }
        }
    }

    out
}

pub fn canonicalize_str(raw: &str) -> Option<Url> {
    Url::parse(raw.trim()).ok().map(|u| canonicalize(&u))
}

/// Resolve an href against its page, keeping only http(s) targets.
pub fn resolve(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let resolved = base.join(href).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    Some(canonicalize(&resolved))
}

/// Host policy applied to discovered links before they enter the frontier.
#[derive(Debug, Clone, Default)]
pub struct LinkPolicy {
    pub same_host_only: bool,
    pub base_host: String,
    pub allow_hosts: Vec<String>,
    pub deny_hosts: Vec<String>,
}

impl LinkPolicy {
    pub fn allows(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        if self
            .deny_hosts
            .iter()
            .any(|d| host == d.to_ascii_lowercase() || host.ends_with(&format!(".{}", d.to_ascii_lowercase())))
        {
            return false;
        }

        if !self.allow_hosts.is_empty() {
            return self
                .allow_hosts
                .iter()
                .any(|a| host == a.to_ascii_lowercase() || host.ends_with(&format!(".{}", a.to_ascii_lowercase())));
        }

        if self.same_host_only {
            let base = self.base_host.to_ascii_lowercase();
            return host == base || host.ends_with(&format!(".{}", base));
        }

        true
    }
}

/// All outbound links from a document, canonicalized and deduplicated,
/// in document order.
pub fn discover(document: &Html, base: &Url, policy: &LinkPolicy) -> Vec<Url> {
    let selector = Selector::parse("a[href]").expect("static selector");
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(resolved) = resolve(base, href) else {
            continue;
        };
        if !policy.allows(&resolved) {
            continue;
        }
        if seen.insert(resolved.to_string()) {
            links.push(resolved);
        }
    }

    links
}
