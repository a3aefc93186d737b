use std::collections::BTreeSet;

/// Deterministic BFS frontier.
///
/// Entries order by `(depth, url_hash, url)`, so given the same seed and
/// the same discovered links, every run visits URLs in the same order:
/// breadth-first by depth, stable within a depth level.
#[derive(Debug, Default)]
pub struct Frontier {
    entries: BTreeSet<(usize, u64, String)>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, depth: usize, url: &str) {
        let hash = xxhash_rust::xxh3::xxh3_64(url.as_bytes());
        self.entries.insert((depth, hash, url.to_string()));
    }

    pub fn pop(&mut self) -> Option<(usize, String)> {
        self.entries
            .pop_first()
            .map(|(depth, _hash, url)| (depth, url))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_shallower_depths_first() {
        let mut frontier = Frontier::new();
        frontier.push(2, "http://example.test/deep");
        frontier.push(0, "http://example.test/");
        frontier.push(1, "http://example.test/mid");

        assert_eq!(frontier.pop().unwrap().0, 0);
        assert_eq!(frontier.pop().unwrap().0, 1);
        assert_eq!(frontier.pop().unwrap().0, 2);
        assert!(frontier.pop().is_none());
    }

    #[test]
    fn order_within_depth_is_deterministic() {
        let urls = [
            "http://example.test/a",
            "http://example.test/b",
            "http://example.test/c",
        ];

        let drain = |order: &[usize]| {
            let mut frontier = Frontier::new();
            for &i in order {
                frontier.push(1, urls[i]);
            }
            let mut out = Vec::new();
            while let Some((_, url)) = frontier.pop() {
                out.push(url);
            }
            out
        };

        // Insertion order must not matter.
        assert_eq!(drain(&[0, 1, 2]), drain(&[2, 0, 1]));
    }

    #[test]
    fn duplicate_urls_collapse() {
        let mut frontier = Frontier::new();
        frontier.push(1, "http://example.test/a");
        frontier.push(1, "http://example.test/a");
        assert_eq!(frontier.len(), 1);
    }
}
