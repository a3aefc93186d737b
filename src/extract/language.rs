use crate::core::types::ComplexityLevel;

/// Detected language code plus detector certainty. Metadata only; the
/// scorer's confidence feature is the single consumer.
#[derive(Debug, Clone)]
pub struct LanguageInfo {
    pub code: String,
    pub confidence: f64,
}

pub fn detect(text: &str) -> Option<LanguageInfo> {
    let sample: String = text.chars().take(2000).collect();
    let info = whatlang::detect(&sample)?;
    Some(LanguageInfo {
        code: info.lang().code().to_string(),
        confidence: info.confidence(),
    })
}

/// Coarse complexity bucket from token count and vocabulary weight.
/// Short plain sentences read as beginner material; long spans with heavy
/// vocabulary land in advanced.
pub fn estimate_complexity(text: &str) -> ComplexityLevel {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return ComplexityLevel::Beginner;
    }

    let word_count = words.len();
    let long_words = words.iter().filter(|w| w.len() >= 9).count();
    let long_ratio = long_words as f64 / word_count as f64;
    let avg_len = words.iter().map(|w| w.len()).sum::<usize>() as f64 / word_count as f64;

    let mut score = 0.0;
    score += match word_count {
        0..=25 => 0.0,
        26..=80 => 1.0,
        81..=200 => 2.0,
        _ => 3.0,
    };
    score += long_ratio * 4.0;
    if avg_len > 6.0 {
        score += 1.0;
    }

    if score < 1.5 {
        ComplexityLevel::Beginner
    } else if score < 3.5 {
        ComplexityLevel::Intermediate
    } else {
        ComplexityLevel::Advanced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_english_with_confidence() {
        let info = detect("The quick brown fox jumps over the lazy dog and keeps running.")
            .expect("should detect");
        assert_eq!(info.code, "eng");
        assert!(info.confidence > 0.0 && info.confidence <= 1.0);
    }

    #[test]
    fn empty_text_detects_nothing() {
        assert!(detect("").is_none());
    }

    #[test]
    fn short_simple_text_is_beginner() {
        assert_eq!(
            estimate_complexity("A list holds items in order."),
            ComplexityLevel::Beginner
        );
    }

    #[test]
    fn dense_technical_text_is_advanced() {
        let text = "Monomorphization specializes polymorphic abstractions instantiating \
                    parameterized implementations, eliminating indirection overhead through \
                    compile-time resolution of associated trait implementations across \
                    instantiation boundaries. Deterministic devirtualization opportunities \
                    proliferate when optimization passes propagate interprocedural constant \
                    information alongside specialization, enabling aggressive inlining \
                    heuristics throughout the intermediate representation. "
            .repeat(3);
        assert_eq!(estimate_complexity(&text), ComplexityLevel::Advanced);
    }
}
