use crate::core::types::{CategorizationRule, ContentType, RuleType};
use crate::extract::Candidate;
use aho_corasick::AhoCorasick;
use regex::Regex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-pattern evaluation budget. The regex engine is linear-time, so this
/// is a backstop for pathological pattern × input combinations; a rule
/// that blows the budget is failed and logged, never the job.
const RULE_EVAL_BUDGET: Duration = Duration::from_millis(100);
/// Rules only ever see this much of a candidate.
const RULE_INPUT_CAP: usize = 16 * 1024;
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Built-in keyword clusters for `semantic` rules: the rule's pattern
/// names a cluster, the candidate matches when any cluster keyword
/// appears. A lookup table, not a model.
const SEMANTIC_CLUSTERS: &[(&str, &[&str])] = &[
    (
        "programming",
        &[
            "function", "variable", "compiler", "syntax", "runtime", "debugging", "algorithm",
            "refactor",
        ],
    ),
    (
        "web-development",
        &["html", "css", "javascript", "frontend", "backend", "http", "browser", "api"],
    ),
    (
        "data-science",
        &["dataset", "regression", "statistics", "pandas", "model", "training", "feature"],
    ),
    (
        "devops",
        &["docker", "kubernetes", "deployment", "pipeline", "container", "terraform", "ci/cd"],
    ),
    (
        "databases",
        &["query", "index", "transaction", "schema", "sql", "migration", "replication"],
    ),
];

/// Result of running the rule set over one candidate.
#[derive(Debug, Clone)]
pub struct Classification {
    pub category: String,
    pub subcategory: Option<String>,
    pub content_type: ContentType,
    pub tags: Vec<String>,
    /// Sum of matched rules' boosts, clamped to [-1, 1].
    pub confidence_boost: f64,
    pub matched_rules: usize,
}

enum Matcher {
    Keyword(AhoCorasick),
    Regex(Regex),
    Structure(String),
    Semantic(&'static [&'static str]),
    /// Pattern failed to compile or named an unknown cluster; the rule is
    /// carried but can never match.
    Inert,
}

struct CompiledRule {
    rule: CategorizationRule,
    matcher: Matcher,
}

/// Active rules compiled for evaluation, ordered by priority ascending
/// then `created_at` ascending (older rules win ties).
pub struct RuleSet {
    rules: Vec<CompiledRule>,
    /// Keyword and semantic patterns, surfaced to the scorer as the
    /// domain vocabulary for the keyword-density feature.
    keywords: Vec<String>,
}

impl RuleSet {
    pub fn compile(mut active: Vec<CategorizationRule>) -> Self {
        active.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        let mut keywords = Vec::new();
        let rules = active
            .into_iter()
            .map(|rule| {
                let matcher = match rule.rule_type {
                    RuleType::Keyword => {
                        keywords.push(rule.pattern.to_lowercase());
                        match AhoCorasick::builder()
                            .ascii_case_insensitive(true)
                            .build([rule.pattern.as_str()])
                        {
                            Ok(ac) => Matcher::Keyword(ac),
                            Err(e) => {
                                warn!("keyword rule '{}' failed to build: {}", rule.rule_name, e);
                                Matcher::Inert
                            }
                        }
                    }
                    RuleType::Regex => match regex::RegexBuilder::new(&rule.pattern)
                        .size_limit(REGEX_SIZE_LIMIT)
                        .case_insensitive(true)
                        .build()
                    {
                        Ok(re) => Matcher::Regex(re),
                        Err(e) => {
                            warn!("regex rule '{}' failed to compile: {}", rule.rule_name, e);
                            Matcher::Inert
                        }
                    },
                    RuleType::Structure => Matcher::Structure(rule.pattern.to_lowercase()),
                    RuleType::Semantic => {
                        let cluster = SEMANTIC_CLUSTERS
                            .iter()
                            .find(|(name, _)| name.eq_ignore_ascii_case(&rule.pattern))
                            .map(|(_, words)| *words);
                        match cluster {
                            Some(words) => {
                                keywords.extend(words.iter().map(|w| w.to_string()));
                                Matcher::Semantic(words)
                            }
                            None => {
                                warn!(
                                    "semantic rule '{}' names unknown cluster '{}'",
                                    rule.rule_name, rule.pattern
                                );
                                Matcher::Inert
                            }
                        }
                    }
                };
                CompiledRule { rule, matcher }
            })
            .collect();

        Self { rules, keywords }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Run the ordered rule set over one candidate.
    ///
    /// The first matching rule assigns `(category, subcategory)`; every
    /// matching rule contributes tags and its confidence boost. Content
    /// type always comes from the structural role. No match leaves the
    /// candidate `uncategorized`.
    pub fn classify(&self, candidate: &Candidate) -> Classification {
        let text: String = candidate
            .raw_text
            .chars()
            .take(RULE_INPUT_CAP)
            .collect::<String>()
            .to_lowercase();

        let mut classification = Classification {
            category: "uncategorized".to_string(),
            subcategory: None,
            content_type: candidate.role.default_content_type(),
            tags: Vec::new(),
            confidence_boost: 0.0,
            matched_rules: 0,
        };

        let mut boost_sum = 0.0;
        for compiled in &self.rules {
            let started = Instant::now();
            let matched = match &compiled.matcher {
                Matcher::Keyword(ac) => ac.is_match(&text),
                Matcher::Regex(re) => re.is_match(&text),
                Matcher::Structure(role) => candidate.role.name() == role,
                Matcher::Semantic(words) => words.iter().any(|w| text.contains(w)),
                Matcher::Inert => false,
            };
            if started.elapsed() > RULE_EVAL_BUDGET {
                warn!(
                    "rule '{}' exceeded its evaluation budget; result discarded",
                    compiled.rule.rule_name
                );
                continue;
            }
            if !matched {
                continue;
            }

            if classification.matched_rules == 0 {
                classification.category = compiled.rule.category.clone();
                classification.subcategory = compiled.rule.subcategory.clone();
            }
            let tag = compiled
                .rule
                .subcategory
                .clone()
                .unwrap_or_else(|| compiled.rule.category.clone());
            if !classification.tags.contains(&tag) {
                classification.tags.push(tag);
            }
            boost_sum += compiled.rule.confidence_boost;
            classification.matched_rules += 1;
        }

        classification.confidence_boost = boost_sum.clamp(-1.0, 1.0);
        debug!(
            "classified candidate at position {} as {}/{:?} ({} rules)",
            candidate.position,
            classification.category,
            classification.subcategory,
            classification.matched_rules
        );
        classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::candidates::StructuralRole;
    use chrono::{TimeZone, Utc};

    fn candidate(text: &str, role: StructuralRole) -> Candidate {
        Candidate {
            raw_text: text.to_string(),
            context: text.to_string(),
            role,
            position: 0,
            heading: None,
        }
    }

    fn rule(
        name: &str,
        rule_type: RuleType,
        pattern: &str,
        category: &str,
        subcategory: Option<&str>,
        priority: i64,
        created_secs: i64,
    ) -> CategorizationRule {
        CategorizationRule {
            rule_name: name.to_string(),
            rule_type,
            pattern: pattern.to_string(),
            category: category.to_string(),
            subcategory: subcategory.map(|s| s.to_string()),
            confidence_boost: 0.1,
            priority,
            active: true,
            created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
        }
    }

    #[test]
    fn no_rules_leaves_uncategorized_with_role_content_type() {
        let set = RuleSet::compile(vec![]);
        let c = set.classify(&candidate(
            "Definition of Alpha.",
            StructuralRole::HeadingParagraph,
        ));
        assert_eq!(c.category, "uncategorized");
        assert_eq!(c.content_type, ContentType::Concept);
        assert_eq!(c.matched_rules, 0);
    }

    #[test]
    fn lower_priority_value_wins_classification() {
        let set = RuleSet::compile(vec![
            rule(
                "r1",
                RuleType::Keyword,
                "python",
                "programming",
                Some("python"),
                2,
                100,
            ),
            rule(
                "r2",
                RuleType::Regex,
                r"function\s+\w+",
                "programming",
                Some("js"),
                1,
                200,
            ),
        ]);
        let c = set.classify(&candidate(
            "A python example: function greet() speaks",
            StructuralRole::ListItem,
        ));
        assert_eq!(c.subcategory.as_deref(), Some("js"));
        assert_eq!(c.matched_rules, 2);
        // Both rules still contribute tags and boost.
        assert!(c.tags.contains(&"python".to_string()));
        assert!((c.confidence_boost - 0.2).abs() < 1e-9);
    }

    #[test]
    fn created_at_breaks_priority_ties() {
        let set = RuleSet::compile(vec![
            rule("newer", RuleType::Keyword, "rust", "b", None, 1, 500),
            rule("older", RuleType::Keyword, "rust", "a", None, 1, 100),
        ]);
        let c = set.classify(&candidate("learning rust today", StructuralRole::ListItem));
        assert_eq!(c.category, "a");
    }

    #[test]
    fn structure_rules_match_role_names() {
        let set = RuleSet::compile(vec![rule(
            "code",
            RuleType::Structure,
            "code-block",
            "programming",
            None,
            1,
            0,
        )]);
        let hit = set.classify(&candidate("let x = 1;", StructuralRole::CodeBlock));
        assert_eq!(hit.category, "programming");
        let miss = set.classify(&candidate("let x = 1;", StructuralRole::ListItem));
        assert_eq!(miss.category, "uncategorized");
    }

    #[test]
    fn semantic_cluster_lookup() {
        let set = RuleSet::compile(vec![rule(
            "web",
            RuleType::Semantic,
            "web-development",
            "web",
            None,
            1,
            0,
        )]);
        let c = set.classify(&candidate(
            "Styling with css and html basics",
            StructuralRole::ListItem,
        ));
        assert_eq!(c.category, "web");
        assert!(!set.keywords().is_empty());
    }

    #[test]
    fn invalid_regex_is_inert_not_fatal() {
        let set = RuleSet::compile(vec![rule(
            "broken",
            RuleType::Regex,
            "([unclosed",
            "x",
            None,
            1,
            0,
        )]);
        let c = set.classify(&candidate("anything at all", StructuralRole::ListItem));
        assert_eq!(c.category, "uncategorized");
    }

    #[test]
    fn boost_sum_is_clamped() {
        let mut rules = Vec::new();
        for i in 0..20 {
            let mut r = rule(
                &format!("r{}", i),
                RuleType::Keyword,
                "alpha",
                "cat",
                None,
                1,
                i,
            );
            r.confidence_boost = 0.9;
            rules.push(r);
        }
        let set = RuleSet::compile(rules);
        let c = set.classify(&candidate("alpha beta gamma", StructuralRole::ListItem));
        assert!((c.confidence_boost - 1.0).abs() < 1e-9);
    }
}
