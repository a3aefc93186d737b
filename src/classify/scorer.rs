use super::engine::Classification;
use crate::core::types::AdaptiveThresholds;
use crate::extract::{Candidate, LanguageInfo, StructuralRole};

// Feature weights for the importance sum. Length dominates, structure and
// domain vocabulary follow, depth and inbound links trail.
const W_LENGTH: f64 = 1.2;
const W_STRUCTURE: f64 = 0.8;
const W_KEYWORDS: f64 = 0.8;
const W_DEPTH: f64 = 0.4;
const W_LINKS: f64 = 0.4;
const W_TOTAL: f64 = W_LENGTH + W_STRUCTURE + W_KEYWORDS + W_DEPTH + W_LINKS;

/// Mid-range content (a solid paragraph up to a long section) scores full
/// marks; fragments and walls of text taper off.
const IDEAL_MIN_WORDS: f64 = 40.0;
const IDEAL_MAX_WORDS: f64 = 400.0;

const BOILERPLATE_SIGNALS: &[&str] = &[
    "cookie",
    "subscribe",
    "newsletter",
    "all rights reserved",
    "privacy policy",
    "terms of service",
    "sign up",
    "log in",
];

#[derive(Debug, Clone, Copy)]
pub struct Scores {
    pub importance: f64,
    pub confidence: f64,
}

/// Compute `importance` and `confidence` in [0, 1] for a classified
/// candidate.
///
/// Importance is a weighted feature sum squashed through a logistic;
/// confidence starts at an even prior and moves with rule agreement,
/// language certainty, and boilerplate signals.
pub fn score(
    candidate: &Candidate,
    classification: &Classification,
    depth: usize,
    link_in_count: usize,
    domain_keywords: &[String],
    language: Option<&LanguageInfo>,
) -> Scores {
    let words = candidate.raw_text.split_whitespace().count() as f64;

    let f_length = if (IDEAL_MIN_WORDS..=IDEAL_MAX_WORDS).contains(&words) {
        1.0
    } else if words < IDEAL_MIN_WORDS {
        (words / IDEAL_MIN_WORDS) * 0.7
    } else {
        ((IDEAL_MAX_WORDS / words) * 0.7).max(0.3)
    };

    let f_structure = match candidate.role {
        StructuralRole::HeadingParagraph
        | StructuralRole::CodeBlock
        | StructuralRole::DefinitionPair
        | StructuralRole::StepItem => 1.0,
        StructuralRole::ListItem if candidate.heading.is_some() => 0.5,
        _ => 0.2,
    };

    let f_keywords = keyword_density(&candidate.raw_text, domain_keywords);
    let f_depth = (1.0 - 0.1 * depth as f64).clamp(0.5, 1.0);
    let f_links = (link_in_count as f64 / 5.0).min(1.0);

    let weighted_mean = (W_LENGTH * f_length
        + W_STRUCTURE * f_structure
        + W_KEYWORDS * f_keywords
        + W_DEPTH * f_depth
        + W_LINKS * f_links)
        / W_TOTAL;
    let importance = logistic(4.0 * (weighted_mean - 0.5));

    let mut confidence = 0.5;
    confidence += (classification.matched_rules as f64 * 0.05).min(0.15);
    confidence += classification.confidence_boost * 0.3;
    if let Some(info) = language {
        confidence += info.confidence * 0.2;
    }
    if has_boilerplate_signal(&candidate.raw_text) {
        confidence -= 0.2;
    } else {
        confidence += 0.1;
    }

    Scores {
        importance: importance.clamp(0.0, 1.0),
        confidence: confidence.clamp(0.0, 1.0),
    }
}

/// Keep decision against the adaptive thresholds. Per-category bonuses
/// raise (or lower) the bar before the comparison.
pub fn keep(scores: Scores, category: &str, thresholds: &AdaptiveThresholds) -> bool {
    let bonus = thresholds.bonus_for(category);
    scores.importance >= thresholds.min_importance_to_store + bonus
        && scores.confidence >= thresholds.min_confidence_to_store + bonus
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Fraction of the domain vocabulary present in the text, saturating at
/// five distinct hits.
fn keyword_density(text: &str, keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let lower = text.to_lowercase();
    let hits = keywords
        .iter()
        .filter(|k| !k.is_empty() && lower.contains(k.as_str()))
        .count();
    (hits as f64 / keywords.len().min(5) as f64).min(1.0)
}

fn has_boilerplate_signal(text: &str) -> bool {
    let lower = text.to_lowercase();
    BOILERPLATE_SIGNALS.iter().any(|s| lower.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::engine::RuleSet;
    use crate::extract::candidates::StructuralRole;

    fn candidate(text: &str, role: StructuralRole, heading: Option<&str>) -> Candidate {
        Candidate {
            raw_text: text.to_string(),
            context: text.to_string(),
            role,
            position: 0,
            heading: heading.map(|h| h.to_string()),
        }
    }

    fn classify_empty(c: &Candidate) -> Classification {
        RuleSet::compile(vec![]).classify(c)
    }

    #[test]
    fn short_concept_lands_mid_range() {
        // The single-page scenario: heading + short definition paragraph,
        // no rules configured.
        let c = candidate(
            "Definition of Alpha.",
            StructuralRole::HeadingParagraph,
            Some("Alpha"),
        );
        let classification = classify_empty(&c);
        let scores = score(&c, &classification, 0, 0, &[], None);

        assert!(
            (0.3..=0.7).contains(&scores.importance),
            "importance {} out of expected band",
            scores.importance
        );
        assert!(
            (0.5..=1.0).contains(&scores.confidence),
            "confidence {} out of expected band",
            scores.confidence
        );
        assert!(keep(scores, "uncategorized", &AdaptiveThresholds::default()));
    }

    #[test]
    fn mid_length_structured_content_scores_higher() {
        let long_text = "Ownership is the core memory model. ".repeat(10);
        let rich = candidate(&long_text, StructuralRole::HeadingParagraph, Some("Rust"));
        let poor = candidate("ok", StructuralRole::ListItem, None);

        let rich_scores = score(&rich, &classify_empty(&rich), 0, 0, &[], None);
        let poor_scores = score(&poor, &classify_empty(&poor), 0, 0, &[], None);
        assert!(rich_scores.importance > poor_scores.importance);
    }

    #[test]
    fn depth_discounts_importance() {
        let text = "A reasonably sized paragraph about memory safety in systems programming \
                    languages, long enough to cross the ideal length floor for the feature."
            .repeat(2);
        let c = candidate(&text, StructuralRole::HeadingParagraph, Some("Memory"));
        let classification = classify_empty(&c);
        let shallow = score(&c, &classification, 0, 0, &[], None);
        let deep = score(&c, &classification, 5, 0, &[], None);
        assert!(shallow.importance > deep.importance);
    }

    #[test]
    fn scores_always_in_unit_range() {
        let samples = [
            ("", StructuralRole::ListItem),
            ("one", StructuralRole::CodeBlock),
            ("word ", StructuralRole::Blockquote),
        ];
        for (text, role) in samples {
            let c = candidate(&text.repeat(500), role, None);
            let classification = classify_empty(&c);
            let scores = score(&c, &classification, 10, 100, &[], None);
            assert!((0.0..=1.0).contains(&scores.importance));
            assert!((0.0..=1.0).contains(&scores.confidence));
        }
    }

    #[test]
    fn boilerplate_signals_cut_confidence() {
        let clean = candidate(
            "Iterators are lazy and composable.",
            StructuralRole::ListItem,
            None,
        );
        let noisy = candidate(
            "Subscribe to our newsletter for cookie policy updates.",
            StructuralRole::ListItem,
            None,
        );
        let clean_scores = score(&clean, &classify_empty(&clean), 0, 0, &[], None);
        let noisy_scores = score(&noisy, &classify_empty(&noisy), 0, 0, &[], None);
        assert!(clean_scores.confidence > noisy_scores.confidence);
    }

    #[test]
    fn category_bonus_raises_the_bar() {
        let mut thresholds = AdaptiveThresholds::default();
        let scores = Scores {
            importance: 0.35,
            confidence: 0.5,
        };
        assert!(keep(scores, "programming", &thresholds));
        thresholds
            .category_bonuses
            .insert("programming".to_string(), 0.1);
        assert!(!keep(scores, "programming", &thresholds));
    }
}
