//! Database schema for the learning store.
//!
//! All statements are idempotent (`IF NOT EXISTS`) and additionally gated by
//! the `schema_migrations` version table, so opening an already-migrated
//! database is a no-op.

/// Current schema version. Bump together with a new migration step.
pub const SCHEMA_VERSION: i64 = 1;

pub const CREATE_MIGRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY NOT NULL,
    applied_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
)
"#;

pub const CREATE_PAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS pages (
    page_id TEXT PRIMARY KEY NOT NULL,
    url TEXT NOT NULL,
    domain TEXT NOT NULL,
    depth INTEGER NOT NULL DEFAULT 0,
    fetched_at INTEGER NOT NULL,
    last_seen INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    title TEXT,
    language TEXT,
    byte_length INTEGER NOT NULL DEFAULT 0,
    reference_count INTEGER NOT NULL DEFAULT 0
)
"#;

pub const CREATE_LEARNING_BITS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS learning_bits (
    bit_id TEXT PRIMARY KEY NOT NULL,
    page_id TEXT NOT NULL REFERENCES pages(page_id),
    content TEXT NOT NULL,
    context TEXT NOT NULL DEFAULT '',
    content_type TEXT NOT NULL,
    category TEXT NOT NULL,
    subcategory TEXT,
    complexity_level TEXT NOT NULL,
    importance_score REAL NOT NULL,
    confidence_score REAL NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    extracted_at INTEGER NOT NULL,
    reference_count INTEGER NOT NULL DEFAULT 0,
    deleted INTEGER NOT NULL DEFAULT 0
)
"#;

pub const CREATE_CROSS_REFERENCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS cross_references (
    source_bit_id TEXT NOT NULL REFERENCES learning_bits(bit_id),
    target_bit_id TEXT NOT NULL REFERENCES learning_bits(bit_id),
    relation_type TEXT NOT NULL,
    strength REAL NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (source_bit_id, target_bit_id, relation_type)
)
"#;

pub const CREATE_CATEGORIZATION_RULES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS categorization_rules (
    rule_name TEXT PRIMARY KEY NOT NULL,
    rule_type TEXT NOT NULL,
    pattern TEXT NOT NULL,
    category TEXT NOT NULL,
    subcategory TEXT,
    confidence_boost REAL NOT NULL DEFAULT 0.1,
    priority INTEGER NOT NULL DEFAULT 5,
    active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
)
"#;

pub const CREATE_CRAWL_JOBS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS crawl_jobs (
    job_id TEXT PRIMARY KEY NOT NULL,
    seed_url TEXT NOT NULL,
    config TEXT NOT NULL,
    state TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 3,
    created_at INTEGER NOT NULL,
    started_at INTEGER,
    ended_at INTEGER,
    attempts INTEGER NOT NULL DEFAULT 0,
    failure_reason TEXT,
    metrics TEXT NOT NULL DEFAULT '{}'
)
"#;

/// Log of dispatched web-search queries and the URLs they returned. Read
/// back for statistics and dedupe diagnostics only.
pub const CREATE_SEARCH_LOG_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS search_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query TEXT NOT NULL,
    engine TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT,
    snippet TEXT,
    relevance REAL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
)
"#;

/// Singleton row (id = 1) holding the adaptive score cutoffs.
pub const CREATE_ADAPTIVE_THRESHOLDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS adaptive_thresholds (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    min_importance REAL NOT NULL,
    min_confidence REAL NOT NULL,
    category_bonuses TEXT NOT NULL DEFAULT '{}',
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
)
"#;

pub const CREATE_BITS_CATEGORY_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_bits_category
ON learning_bits(category, importance_score DESC)
"#;

pub const CREATE_BITS_CONTENT_TYPE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_bits_content_type
ON learning_bits(content_type)
"#;

pub const CREATE_BITS_EXTRACTED_AT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_bits_extracted_at
ON learning_bits(extracted_at DESC)
"#;

pub const CREATE_PAGES_DOMAIN_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_pages_domain
ON pages(domain)
"#;

pub const CREATE_JOBS_STATE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_jobs_state
ON crawl_jobs(state)
"#;

/// FTS5 virtual table over bit content and context.
///
/// `bit_id` is UNINDEXED so it is available for joins without being
/// tokenized. Kept in sync with `learning_bits` via the triggers below so
/// a bit insert updates both tables inside the same transaction.
pub const CREATE_BITS_FTS_TABLE: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS learning_bits_fts USING fts5(
    bit_id UNINDEXED,
    content,
    context,
    tokenize='porter unicode61'
)
"#;

pub const CREATE_BITS_FTS_INSERT_TRIGGER: &str = r#"
CREATE TRIGGER IF NOT EXISTS learning_bits_ai AFTER INSERT ON learning_bits BEGIN
    INSERT INTO learning_bits_fts(bit_id, content, context)
    VALUES (new.bit_id, new.content, new.context);
END
"#;

pub const CREATE_BITS_FTS_DELETE_TRIGGER: &str = r#"
CREATE TRIGGER IF NOT EXISTS learning_bits_ad AFTER DELETE ON learning_bits BEGIN
    DELETE FROM learning_bits_fts WHERE bit_id = old.bit_id;
END
"#;

pub const CREATE_BITS_FTS_SOFT_DELETE_TRIGGER: &str = r#"
CREATE TRIGGER IF NOT EXISTS learning_bits_soft_delete
AFTER UPDATE OF deleted ON learning_bits WHEN new.deleted = 1 BEGIN
    DELETE FROM learning_bits_fts WHERE bit_id = new.bit_id;
END
"#;

/// Every statement applied by migration step 1, in order.
pub const MIGRATION_V1: &[&str] = &[
    CREATE_PAGES_TABLE,
    CREATE_LEARNING_BITS_TABLE,
    CREATE_CROSS_REFERENCES_TABLE,
    CREATE_CATEGORIZATION_RULES_TABLE,
    CREATE_CRAWL_JOBS_TABLE,
    CREATE_SEARCH_LOG_TABLE,
    CREATE_ADAPTIVE_THRESHOLDS_TABLE,
    CREATE_BITS_CATEGORY_INDEX,
    CREATE_BITS_CONTENT_TYPE_INDEX,
    CREATE_BITS_EXTRACTED_AT_INDEX,
    CREATE_PAGES_DOMAIN_INDEX,
    CREATE_JOBS_STATE_INDEX,
    CREATE_BITS_FTS_TABLE,
    CREATE_BITS_FTS_INSERT_TRIGGER,
    CREATE_BITS_FTS_DELETE_TRIGGER,
    CREATE_BITS_FTS_SOFT_DELETE_TRIGGER,
];
