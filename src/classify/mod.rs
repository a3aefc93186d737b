//! Rule-driven classification and scoring of candidate spans.
//!
//! The [`engine::RuleSet`] applies ordered categorization rules, the
//! [`scorer`] turns features into importance/confidence, and
//! [`adaptive::RetentionTracker`] feeds observed keep rates back into the
//! shared thresholds.

pub mod adaptive;
pub mod engine;
pub mod scorer;

pub use adaptive::RetentionTracker;
pub use engine::{Classification, RuleSet};
pub use scorer::{keep, score, Scores};
