use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ───────────────────────────────────────────────────────────────────────────
// Identifiers
//
// Pages and bits are content-addressed: a page id is the hash of its
// canonical URL, a bit id is the hash of its page id plus normalized
// content. Re-ingesting identical content therefore cannot mint new ids.
// ───────────────────────────────────────────────────────────────────────────

pub fn page_id_for(canonical_url: &str) -> String {
    format!("{:016x}", xxhash_rust::xxh3::xxh3_64(canonical_url.as_bytes()))
}

pub fn content_hash_for(body: &[u8]) -> String {
    format!("{:016x}", xxhash_rust::xxh3::xxh3_64(body))
}

pub fn bit_id_for(page_id: &str, content: &str) -> String {
    let normalized = content.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut buf = String::with_capacity(page_id.len() + 1 + normalized.len());
    buf.push_str(page_id);
    buf.push('\n');
    buf.push_str(&normalized.to_lowercase());
    format!("{:016x}", xxhash_rust::xxh3::xxh3_64(buf.as_bytes()))
}

// ───────────────────────────────────────────────────────────────────────────
// Pages
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageStatus {
    Fetched,
    ParseFailed,
    SkippedRobots,
    SkippedDedup,
    /// Oversize body or otherwise rejected before parsing.
    Skipped,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Fetched => "fetched",
            PageStatus::ParseFailed => "parse-failed",
            PageStatus::SkippedRobots => "skipped-robots",
            PageStatus::SkippedDedup => "skipped-dedup",
            PageStatus::Skipped => "skipped",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "fetched" => Some(PageStatus::Fetched),
            "parse-failed" => Some(PageStatus::ParseFailed),
            "skipped-robots" => Some(PageStatus::SkippedRobots),
            "skipped-dedup" => Some(PageStatus::SkippedDedup),
            "skipped" => Some(PageStatus::Skipped),
            _ => None,
        }
    }
}

/// A single fetched URL. Immutable once written except for `last_seen`
/// and `reference_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub page_id: String,
    pub url: String,
    pub domain: String,
    pub depth: usize,
    pub fetched_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub content_hash: String,
    pub status: PageStatus,
    pub title: Option<String>,
    pub language: Option<String>,
    pub byte_length: usize,
    pub reference_count: u64,
}

// ───────────────────────────────────────────────────────────────────────────
// Learning bits
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    Concept,
    Definition,
    Example,
    TutorialStep,
    Code,
    Reference,
    Other,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Concept => "concept",
            ContentType::Definition => "definition",
            ContentType::Example => "example",
            ContentType::TutorialStep => "tutorial-step",
            ContentType::Code => "code",
            ContentType::Reference => "reference",
            ContentType::Other => "other",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "concept" => Some(ContentType::Concept),
            "definition" => Some(ContentType::Definition),
            "example" => Some(ContentType::Example),
            "tutorial-step" => Some(ContentType::TutorialStep),
            "code" => Some(ContentType::Code),
            "reference" => Some(ContentType::Reference),
            "other" => Some(ContentType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl ComplexityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityLevel::Beginner => "beginner",
            ComplexityLevel::Intermediate => "intermediate",
            ComplexityLevel::Advanced => "advanced",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "beginner" => Some(ComplexityLevel::Beginner),
            "intermediate" => Some(ComplexityLevel::Intermediate),
            "advanced" => Some(ComplexityLevel::Advanced),
            _ => None,
        }
    }
}

/// One extracted knowledge unit. Content is immutable; only
/// `reference_count` moves after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningBit {
    pub bit_id: String,
    pub page_id: String,
    pub content: String,
    /// Surrounding text, bounded length.
    pub context: String,
    pub content_type: ContentType,
    pub category: String,
    pub subcategory: Option<String>,
    pub complexity_level: ComplexityLevel,
    pub importance_score: f64,
    pub confidence_score: f64,
    pub tags: Vec<String>,
    pub extracted_at: DateTime<Utc>,
    pub reference_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Related,
    DependsOn,
    Similar,
    Contradicts,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Related => "related",
            RelationType::DependsOn => "depends_on",
            RelationType::Similar => "similar",
            RelationType::Contradicts => "contradicts",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "related" => Some(RelationType::Related),
            "depends_on" => Some(RelationType::DependsOn),
            "similar" => Some(RelationType::Similar),
            "contradicts" => Some(RelationType::Contradicts),
            _ => None,
        }
    }
}

/// Directed relation between two bits. Keyed on (source, target, relation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossReference {
    pub source_bit_id: String,
    pub target_bit_id: String,
    pub relation_type: RelationType,
    pub strength: f64,
    pub created_at: DateTime<Utc>,
}

/// Filter for `query_bits`; all clauses are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct BitFilter {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub content_type: Option<ContentType>,
    pub complexity: Option<ComplexityLevel>,
    pub min_importance: Option<f64>,
    pub limit: usize,
    pub offset: usize,
}

// ───────────────────────────────────────────────────────────────────────────
// Categorization rules
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Keyword,
    Regex,
    Structure,
    Semantic,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Keyword => "keyword",
            RuleType::Regex => "regex",
            RuleType::Structure => "structure",
            RuleType::Semantic => "semantic",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "keyword" => Some(RuleType::Keyword),
            "regex" => Some(RuleType::Regex),
            "structure" => Some(RuleType::Structure),
            "semantic" => Some(RuleType::Semantic),
            _ => None,
        }
    }
}

/// Mutable classification rule. Deactivated rather than deleted so the
/// history of what classified past bits stays reconstructible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizationRule {
    pub rule_name: String,
    pub rule_type: RuleType,
    pub pattern: String,
    pub category: String,
    pub subcategory: Option<String>,
    /// Additive confidence adjustment in [-1, 1].
    pub confidence_boost: f64,
    /// Lower value = higher precedence.
    pub priority: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// ───────────────────────────────────────────────────────────────────────────
// Crawl jobs
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
            JobState::TimedOut => "timed-out",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobState::Queued),
            "running" => Some(JobState::Running),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            "cancelled" => Some(JobState::Cancelled),
            "timed-out" => Some(JobState::TimedOut),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Critical = 1,
    High = 2,
    Normal = 3,
    Low = 4,
}

impl JobPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPriority::Critical => "critical",
            JobPriority::High => "high",
            JobPriority::Normal => "normal",
            JobPriority::Low => "low",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(JobPriority::Critical),
            "high" => Some(JobPriority::High),
            "normal" => Some(JobPriority::Normal),
            "low" => Some(JobPriority::Low),
            _ => None,
        }
    }

    /// Queue index, highest priority first.
    pub fn index(&self) -> usize {
        *self as usize - 1
    }
}

/// Counters accumulated while a job runs. Error counts are bucketed by
/// `CrawlError::class()` and are reported even on success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobMetrics {
    pub pages_fetched: usize,
    pub bits_emitted: usize,
    pub bytes_downloaded: u64,
    pub links_discovered: usize,
    pub pages_skipped: usize,
    pub errors: HashMap<String, u64>,
}

impl JobMetrics {
    pub fn count_error(&mut self, class: &str) {
        *self.errors.entry(class.to_string()).or_insert(0) += 1;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    pub job_id: String,
    pub seed_url: String,
    pub config: crate::crawler::CrawlConfig,
    pub state: JobState,
    pub priority: JobPriority,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub failure_reason: Option<String>,
    pub metrics: JobMetrics,
}

// ───────────────────────────────────────────────────────────────────────────
// Adaptive thresholds
// ───────────────────────────────────────────────────────────────────────────

/// Singleton score cutoffs consulted before a bit is stored. Updated by
/// the adaptive loop; every update is persisted atomically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveThresholds {
    pub min_importance_to_store: f64,
    pub min_confidence_to_store: f64,
    /// Per-category additive adjustments applied before the comparison.
    pub category_bonuses: HashMap<String, f64>,
}

impl Default for AdaptiveThresholds {
    fn default() -> Self {
        Self {
            min_importance_to_store: 0.3,
            min_confidence_to_store: 0.4,
            category_bonuses: HashMap::new(),
        }
    }
}

impl AdaptiveThresholds {
    pub fn bonus_for(&self, category: &str) -> f64 {
        self.category_bonuses.get(category).copied().unwrap_or(0.0)
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Web search
// ───────────────────────────────────────────────────────────────────────────

/// One unified result out of the multi-provider fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Providers that corroborated this URL.
    pub providers: Vec<String>,
    /// Best (lowest) rank across providers, 1-based.
    pub rank: usize,
    pub relevance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchResponse {
    pub query: String,
    pub results: Vec<WebSearchResult>,
    /// Diagnostic set when the dispatcher degraded (e.g. "no providers").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ───────────────────────────────────────────────────────────────────────────
// Tool-surface responses
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Result of a blocking `crawl_website` invocation.
#[derive(Debug, Serialize, Deserialize)]
pub struct CrawlOutcome {
    pub job_id: String,
    pub seed_url: String,
    pub pages_crawled: usize,
    pub bits_extracted: usize,
    pub duration_ms: u64,
    pub state: JobState,
    pub metrics: JobMetrics,
}

/// Per-job view returned by `get_background_crawl_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: String,
    pub seed_url: String,
    pub state: JobState,
    pub priority: JobPriority,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub metrics: JobMetrics,
}

/// Learning bit as surfaced through the tool boundary: long content is
/// truncated with a trailing ellipsis so responses stay bounded.
#[derive(Debug, Serialize, Deserialize)]
pub struct LearningBitView {
    pub bit_id: String,
    pub content_type: ContentType,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub content: String,
    pub context: String,
    pub complexity_level: ComplexityLevel,
    pub importance_score: f64,
    pub confidence_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    pub source_url: Option<String>,
    pub tags: Vec<String>,
    pub extracted_at: DateTime<Utc>,
    pub reference_count: u64,
}

pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push_str("...");
        out
    } else {
        text.to_string()
    }
}

/// Aggregate statistics report for `get_learning_statistics`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LearningStatistics {
    pub total_learning_bits: u64,
    pub total_crawled_pages: u64,
    pub category_distribution: HashMap<String, u64>,
    pub content_type_distribution: HashMap<String, u64>,
    pub complexity_distribution: HashMap<String, u64>,
    pub top_source_domains: Vec<(String, u64)>,
    pub average_importance: f64,
    pub average_confidence: f64,
    pub average_references: f64,
    pub bits_last_7_days: u64,
    pub generated_at: DateTime<Utc>,
}
