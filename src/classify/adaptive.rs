use crate::core::types::AdaptiveThresholds;
use std::collections::HashMap;
use tracing::info;

/// Adaptation runs after this many bits have been persisted since the
/// previous step.
pub const ADAPT_EVERY_BITS: usize = 100;
/// Per-category retention converges toward this rate.
pub const TARGET_RETENTION: f64 = 0.6;
/// Acceptable band around the target before a threshold moves.
pub const RETENTION_BAND: f64 = 0.1;
/// Hard bound on how far any threshold moves in one step.
pub const MAX_STEP: f64 = 0.05;

const THRESHOLD_FLOOR: f64 = 0.05;
const THRESHOLD_CEIL: f64 = 0.95;
const BONUS_BOUND: f64 = 0.2;
/// Categories need this many observations before their bonus moves.
const MIN_CATEGORY_SAMPLES: usize = 20;

#[derive(Debug, Default, Clone, Copy)]
struct Window {
    seen: usize,
    kept: usize,
}

impl Window {
    fn retention(&self) -> Option<f64> {
        if self.seen == 0 {
            None
        } else {
            Some(self.kept as f64 / self.seen as f64)
        }
    }
}

/// Observed keep/drop outcomes since the last adaptation step.
///
/// The crawler records every scored candidate here; once enough bits have
/// been persisted, `adapt` nudges the thresholds so retention drifts back
/// toward the target, moving each threshold by at most [`MAX_STEP`].
#[derive(Debug, Default)]
pub struct RetentionTracker {
    overall: Window,
    /// Candidates whose importance cleared the current importance bar.
    importance_passed: usize,
    /// Candidates whose confidence cleared the current confidence bar.
    confidence_passed: usize,
    per_category: HashMap<String, Window>,
    kept_since_adapt: usize,
}

impl RetentionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(
        &mut self,
        category: &str,
        importance: f64,
        confidence: f64,
        thresholds: &AdaptiveThresholds,
        kept: bool,
    ) {
        self.overall.seen += 1;
        let bonus = thresholds.bonus_for(category);
        if importance >= thresholds.min_importance_to_store + bonus {
            self.importance_passed += 1;
        }
        if confidence >= thresholds.min_confidence_to_store + bonus {
            self.confidence_passed += 1;
        }

        let window = self.per_category.entry(category.to_string()).or_default();
        window.seen += 1;
        if kept {
            self.overall.kept += 1;
            window.kept += 1;
            self.kept_since_adapt += 1;
        }
    }

    pub fn should_adapt(&self) -> bool {
        self.kept_since_adapt >= ADAPT_EVERY_BITS
    }

    /// One adaptation step. Returns the updated thresholds and resets the
    /// observation window.
    pub fn adapt(&mut self, current: &AdaptiveThresholds) -> AdaptiveThresholds {
        let mut next = current.clone();
        let seen = self.overall.seen.max(1) as f64;

        let importance_rate = self.importance_passed as f64 / seen;
        next.min_importance_to_store =
            step_toward_target(current.min_importance_to_store, importance_rate);

        let confidence_rate = self.confidence_passed as f64 / seen;
        next.min_confidence_to_store =
            step_toward_target(current.min_confidence_to_store, confidence_rate);

        for (category, window) in &self.per_category {
            if window.seen < MIN_CATEGORY_SAMPLES {
                continue;
            }
            let Some(retention) = window.retention() else {
                continue;
            };
            let bonus = next.category_bonuses.entry(category.clone()).or_insert(0.0);
            if retention > TARGET_RETENTION + RETENTION_BAND {
                *bonus = (*bonus + MAX_STEP).min(BONUS_BOUND);
            } else if retention < TARGET_RETENTION - RETENTION_BAND {
                *bonus = (*bonus - MAX_STEP).max(-BONUS_BOUND);
            }
        }
        next.category_bonuses.retain(|_, b| b.abs() > f64::EPSILON);

        info!(
            "adaptive step: importance {:.2} -> {:.2}, confidence {:.2} -> {:.2} \
             (pass rates {:.0}% / {:.0}%, {} candidates)",
            current.min_importance_to_store,
            next.min_importance_to_store,
            current.min_confidence_to_store,
            next.min_confidence_to_store,
            importance_rate * 100.0,
            confidence_rate * 100.0,
            self.overall.seen
        );

        *self = Self::default();
        next
    }
}

/// Raise the threshold when far too much passes, lower it when far too
/// little does, by exactly one bounded step.
fn step_toward_target(threshold: f64, pass_rate: f64) -> f64 {
    if pass_rate > TARGET_RETENTION + RETENTION_BAND {
        (threshold + MAX_STEP).min(THRESHOLD_CEIL)
    } else if pass_rate < TARGET_RETENTION - RETENTION_BAND {
        (threshold - MAX_STEP).max(THRESHOLD_FLOOR)
    } else {
        threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_pass_rate_raises_importance_by_one_step() {
        let thresholds = AdaptiveThresholds::default();
        let mut tracker = RetentionTracker::new();

        // 95% of candidates score well above the importance bar.
        for i in 0..200 {
            let importance = if i % 20 == 0 { 0.1 } else { 0.85 };
            tracker.observe("docs", importance, 0.9, &thresholds, importance > 0.3);
        }
        assert!(tracker.should_adapt());

        let next = tracker.adapt(&thresholds);
        assert!(
            (next.min_importance_to_store - (thresholds.min_importance_to_store + MAX_STEP)).abs()
                < 1e-9,
            "expected exactly one +0.05 step"
        );
    }

    #[test]
    fn low_pass_rate_lowers_threshold() {
        let thresholds = AdaptiveThresholds::default();
        let mut tracker = RetentionTracker::new();
        for _ in 0..150 {
            tracker.observe("docs", 0.1, 0.1, &thresholds, false);
        }
        // Not enough kept bits to trigger on its own, force a step.
        let next = tracker.adapt(&thresholds);
        assert!(next.min_importance_to_store < thresholds.min_importance_to_store);
        assert!(
            (thresholds.min_importance_to_store - next.min_importance_to_store) <= MAX_STEP + 1e-9
        );
    }

    #[test]
    fn in_band_rate_leaves_thresholds_alone() {
        let thresholds = AdaptiveThresholds::default();
        let mut tracker = RetentionTracker::new();
        for i in 0..100 {
            // 60% pass rate, dead on target.
            let importance = if i % 5 < 3 { 0.8 } else { 0.1 };
            tracker.observe("docs", importance, 0.8, &thresholds, importance > 0.3);
        }
        let next = tracker.adapt(&thresholds);
        assert!((next.min_importance_to_store - thresholds.min_importance_to_store).abs() < 1e-9);
    }

    #[test]
    fn category_bonus_moves_only_with_enough_samples() {
        let thresholds = AdaptiveThresholds::default();
        let mut tracker = RetentionTracker::new();
        // Plenty of over-retained "docs" observations, a handful of "rare".
        for _ in 0..50 {
            tracker.observe("docs", 0.9, 0.9, &thresholds, true);
        }
        for _ in 0..5 {
            tracker.observe("rare", 0.9, 0.9, &thresholds, true);
        }
        let next = tracker.adapt(&thresholds);
        assert!((next.bonus_for("docs") - MAX_STEP).abs() < 1e-9);
        assert!(next.bonus_for("rare").abs() < 1e-9);
    }

    #[test]
    fn thresholds_stay_bounded_across_many_steps() {
        let mut thresholds = AdaptiveThresholds::default();
        for _ in 0..50 {
            let mut tracker = RetentionTracker::new();
            for _ in 0..100 {
                tracker.observe("docs", 0.99, 0.99, &thresholds, true);
            }
            thresholds = tracker.adapt(&thresholds);
        }
        assert!(thresholds.min_importance_to_store <= THRESHOLD_CEIL);
        assert!(thresholds.min_confidence_to_store <= THRESHOLD_CEIL);
    }
}
