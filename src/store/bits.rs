use super::{store_err, ts_to_datetime, Store};
use crate::core::error::{CrawlError, Result};
use crate::core::types::{
    BitFilter, ComplexityLevel, ContentType, CrossReference, LearningBit, RelationType,
};
use libsql::params;
use tracing::debug;

/// Bits are written in transactions of at least this many rows; the FTS
/// index is maintained by triggers inside the same transaction.
const BIT_BATCH_SIZE: usize = 64;

impl Store {
    /// Insert a batch of bits. Idempotent on `bit_id`: re-ingesting a page
    /// with unchanged content inserts nothing. Returns how many rows were
    /// actually new.
    pub async fn insert_bits(&self, bits: &[LearningBit]) -> Result<usize> {
        if bits.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_guard().await;
        let mut inserted = 0usize;

        for chunk in bits.chunks(BIT_BATCH_SIZE) {
            inserted += self
                .with_retries("insert_bits", || async {
                    let conn = self.connect()?;
                    conn.execute("BEGIN TRANSACTION", ()).await.map_err(store_err)?;

                    let mut chunk_inserted = 0usize;
                    for bit in chunk {
                        let tags_json = serde_json::to_string(&bit.tags)
                            .map_err(|e| CrawlError::StoreUnavailable(e.to_string()))?;
                        let res = conn
                            .execute(
                                r#"
                                INSERT OR IGNORE INTO learning_bits (
                                    bit_id, page_id, content, context, content_type,
                                    category, subcategory, complexity_level,
                                    importance_score, confidence_score, tags,
                                    extracted_at, reference_count
                                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                                "#,
                                params![
                                    bit.bit_id.clone(),
                                    bit.page_id.clone(),
                                    bit.content.clone(),
                                    bit.context.clone(),
                                    bit.content_type.as_str(),
                                    bit.category.clone(),
                                    bit.subcategory.clone(),
                                    bit.complexity_level.as_str(),
                                    bit.importance_score,
                                    bit.confidence_score,
                                    tags_json,
                                    bit.extracted_at.timestamp(),
                                    bit.reference_count as i64,
                                ],
                            )
                            .await;

                        match res {
                            Ok(n) => chunk_inserted += n as usize,
                            Err(e) => {
                                let _ = conn.execute("ROLLBACK", ()).await;
                                return Err(store_err(e));
                            }
                        }
                    }

                    conn.execute("COMMIT", ()).await.map_err(store_err)?;
                    Ok(chunk_inserted)
                })
                .await?;
        }

        debug!("inserted {} of {} bits", inserted, bits.len());
        Ok(inserted)
    }

    /// Filtered, paged retrieval ordered by importance then recency.
    pub async fn query_bits(&self, filter: &BitFilter) -> Result<Vec<LearningBit>> {
        let mut sql = String::from(
            r#"
            SELECT bit_id, page_id, content, context, content_type, category,
                   subcategory, complexity_level, importance_score,
                   confidence_score, tags, extracted_at, reference_count
            FROM learning_bits WHERE deleted = 0
            "#,
        );
        let mut args: Vec<libsql::Value> = Vec::new();

        if let Some(category) = &filter.category {
            sql.push_str(" AND category = ?");
            args.push(category.clone().into());
        }
        if let Some(subcategory) = &filter.subcategory {
            sql.push_str(" AND subcategory = ?");
            args.push(subcategory.clone().into());
        }
        if let Some(content_type) = filter.content_type {
            sql.push_str(" AND content_type = ?");
            args.push(content_type.as_str().to_string().into());
        }
        if let Some(complexity) = filter.complexity {
            sql.push_str(" AND complexity_level = ?");
            args.push(complexity.as_str().to_string().into());
        }
        if let Some(min_importance) = filter.min_importance {
            sql.push_str(" AND importance_score >= ?");
            args.push(min_importance.into());
        }

        sql.push_str(" ORDER BY importance_score DESC, extracted_at DESC LIMIT ? OFFSET ?");
        let limit = if filter.limit == 0 { 20 } else { filter.limit };
        args.push((limit as i64).into());
        args.push((filter.offset as i64).into());

        let conn = self.connect()?;
        let mut rows = conn.query(&sql, args).await.map_err(store_err)?;

        let mut bits = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_err)? {
            bits.push(row_to_bit(&row)?);
        }
        Ok(bits)
    }

    /// Full-text search over bit content and context.
    ///
    /// Candidates come from the FTS index; final ranking combines per-token
    /// hits with the stored importance and confidence scores, so a highly
    /// trusted bit outranks a barely relevant one. Returned with the
    /// computed relevance.
    pub async fn search_bits(
        &self,
        query: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(LearningBit, f64)>> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        // OR-match so partial phrasing still hits; relevance scoring below
        // rewards fuller matches.
        let match_expr = tokens
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR ");

        let mut sql = String::from(
            r#"
            SELECT b.bit_id, b.page_id, b.content, b.context, b.content_type,
                   b.category, b.subcategory, b.complexity_level,
                   b.importance_score, b.confidence_score, b.tags,
                   b.extracted_at, b.reference_count
            FROM learning_bits_fts f
            JOIN learning_bits b ON b.bit_id = f.bit_id
            WHERE f.learning_bits_fts MATCH ? AND b.deleted = 0
            "#,
        );
        let mut args: Vec<libsql::Value> = vec![match_expr.into()];
        if let Some(category) = category {
            sql.push_str(" AND b.category = ?");
            args.push(category.to_string().into());
        }
        sql.push_str(" ORDER BY rank LIMIT ?");
        // Overfetch so the re-rank below has room to reorder.
        args.push(((limit.max(1) * 2) as i64).into());

        let conn = self.connect()?;
        let mut rows = conn.query(&sql, args).await.map_err(store_err)?;

        let mut scored = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_err)? {
            let bit = row_to_bit(&row)?;
            let relevance = bit_relevance(&bit, &tokens);
            scored.push((bit, relevance));
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.0.importance_score
                        .partial_cmp(&a.0.importance_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| b.0.extracted_at.cmp(&a.0.extracted_at))
        });
        scored.truncate(limit.max(1));
        Ok(scored)
    }

    /// Batched reference-count bump for bits returned through the tool
    /// surface.
    pub async fn bump_reference_counts(&self, bit_ids: &[String]) -> Result<()> {
        if bit_ids.is_empty() {
            return Ok(());
        }
        let _guard = self.write_guard().await;
        let conn = self.connect()?;
        conn.execute("BEGIN TRANSACTION", ()).await.map_err(store_err)?;
        for bit_id in bit_ids {
            if let Err(e) = conn
                .execute(
                    "UPDATE learning_bits SET reference_count = reference_count + 1 WHERE bit_id = ?",
                    params![bit_id.clone()],
                )
                .await
            {
                let _ = conn.execute("ROLLBACK", ()).await;
                return Err(store_err(e));
            }
        }
        conn.execute("COMMIT", ()).await.map_err(store_err)?;
        Ok(())
    }

    pub async fn count_bits(&self) -> Result<u64> {
        let conn = self.connect()?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM learning_bits WHERE deleted = 0", ())
            .await
            .map_err(store_err)?;
        match rows.next().await.map_err(store_err)? {
            Some(row) => {
                let n: i64 = row.get(0).map_err(store_err)?;
                Ok(n as u64)
            }
            None => Ok(0),
        }
    }

    /// Insert cross-references; idempotent on the (source, target,
    /// relation) key.
    pub async fn insert_cross_refs(&self, refs: &[CrossReference]) -> Result<()> {
        if refs.is_empty() {
            return Ok(());
        }
        let _guard = self.write_guard().await;
        let conn = self.connect()?;
        conn.execute("BEGIN TRANSACTION", ()).await.map_err(store_err)?;
        for cross_ref in refs {
            if let Err(e) = conn
                .execute(
                    r#"
                    INSERT OR IGNORE INTO cross_references
                        (source_bit_id, target_bit_id, relation_type, strength, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                    params![
                        cross_ref.source_bit_id.clone(),
                        cross_ref.target_bit_id.clone(),
                        cross_ref.relation_type.as_str(),
                        cross_ref.strength,
                        cross_ref.created_at.timestamp(),
                    ],
                )
                .await
            {
                let _ = conn.execute("ROLLBACK", ()).await;
                return Err(store_err(e));
            }
        }
        conn.execute("COMMIT", ()).await.map_err(store_err)?;
        Ok(())
    }

    pub async fn list_cross_refs(&self, source_bit_id: &str) -> Result<Vec<CrossReference>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                r#"
                SELECT source_bit_id, target_bit_id, relation_type, strength, created_at
                FROM cross_references WHERE source_bit_id = ?
                "#,
                params![source_bit_id],
            )
            .await
            .map_err(store_err)?;

        let mut refs = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_err)? {
            let relation_raw: String = row.get(2).map_err(store_err)?;
            refs.push(CrossReference {
                source_bit_id: row.get(0).map_err(store_err)?,
                target_bit_id: row.get(1).map_err(store_err)?,
                relation_type: RelationType::parse_str(&relation_raw)
                    .unwrap_or(RelationType::Related),
                strength: row.get(3).map_err(store_err)?,
                created_at: ts_to_datetime(row.get(4).map_err(store_err)?),
            });
        }
        Ok(refs)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.len() > 2)
        .map(|s| s.to_string())
        .collect()
}

/// Relevance of a stored bit for a tokenized query: a small reward per
/// matched token plus weight from the bit's own importance and confidence.
fn bit_relevance(bit: &LearningBit, tokens: &[String]) -> f64 {
    let haystack = format!("{} {}", bit.content, bit.context).to_lowercase();
    let mut relevance = 0.0;
    for token in tokens {
        if haystack.contains(token.as_str()) {
            relevance += 0.1;
        }
    }
    relevance += bit.importance_score * 0.3;
    relevance += bit.confidence_score * 0.2;
    relevance.min(1.0)
}

fn row_to_bit(row: &libsql::Row) -> Result<LearningBit> {
    let content_type_raw: String = row.get(4).map_err(store_err)?;
    let complexity_raw: String = row.get(7).map_err(store_err)?;
    let tags_json: String = row.get(10).map_err(store_err)?;
    Ok(LearningBit {
        bit_id: row.get(0).map_err(store_err)?,
        page_id: row.get(1).map_err(store_err)?,
        content: row.get(2).map_err(store_err)?,
        context: row.get(3).map_err(store_err)?,
        content_type: ContentType::parse_str(&content_type_raw).unwrap_or(ContentType::Other),
        category: row.get(5).map_err(store_err)?,
        subcategory: row.get(6).ok(),
        complexity_level: ComplexityLevel::parse_str(&complexity_raw)
            .unwrap_or(ComplexityLevel::Intermediate),
        importance_score: row.get(8).map_err(store_err)?,
        confidence_score: row.get(9).map_err(store_err)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        extracted_at: ts_to_datetime(row.get(11).map_err(store_err)?),
        reference_count: row.get::<i64>(12).map_err(store_err)? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn store_with_page() -> (Store, String) {
        let store = Store::open(":memory:").await.unwrap();
        let page_id = crate::core::types::page_id_for("http://example.test/");
        let page = crate::core::types::Page {
            page_id: page_id.clone(),
            url: "http://example.test/".to_string(),
            domain: "example.test".to_string(),
            depth: 0,
            fetched_at: Utc::now(),
            last_seen: Utc::now(),
            content_hash: "abcd".to_string(),
            status: crate::core::types::PageStatus::Fetched,
            title: None,
            language: None,
            byte_length: 0,
            reference_count: 0,
        };
        store.upsert_page(&page).await.unwrap();
        (store, page_id)
    }

    fn bit(page_id: &str, content: &str, importance: f64) -> LearningBit {
        LearningBit {
            bit_id: crate::core::types::bit_id_for(page_id, content),
            page_id: page_id.to_string(),
            content: content.to_string(),
            context: String::new(),
            content_type: ContentType::Concept,
            category: "uncategorized".to_string(),
            subcategory: None,
            complexity_level: ComplexityLevel::Beginner,
            importance_score: importance,
            confidence_score: 0.8,
            tags: vec![],
            extracted_at: Utc::now(),
            reference_count: 0,
        }
    }

    #[tokio::test]
    async fn insert_is_idempotent_on_bit_id() {
        let (store, page_id) = store_with_page().await;
        let bits = vec![
            bit(&page_id, "Ownership moves values between bindings", 0.7),
            bit(&page_id, "Borrowing lends references without moving", 0.6),
        ];
        assert_eq!(store.insert_bits(&bits).await.unwrap(), 2);
        // Same content hashes to the same ids; nothing new lands.
        assert_eq!(store.insert_bits(&bits).await.unwrap(), 0);
        assert_eq!(store.count_bits().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn query_bits_applies_filters() {
        let (store, page_id) = store_with_page().await;
        let mut important = bit(&page_id, "Lifetimes bound reference validity", 0.9);
        important.category = "programming".to_string();
        let trivial = bit(&page_id, "A footer link", 0.1);
        store.insert_bits(&[important, trivial]).await.unwrap();

        let filter = BitFilter {
            min_importance: Some(0.5),
            limit: 10,
            ..Default::default()
        };
        let found = store.query_bits(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].category, "programming");
    }

    #[tokio::test]
    async fn fts_search_finds_and_ranks() {
        let (store, page_id) = store_with_page().await;
        let bits = vec![
            bit(&page_id, "Rust ownership is a memory management model", 0.9),
            bit(&page_id, "Cooking pasta requires boiling water", 0.9),
        ];
        store.insert_bits(&bits).await.unwrap();

        let results = store.search_bits("rust ownership", None, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].0.content.contains("ownership"));
        assert!(results[0].1 > 0.0 && results[0].1 <= 1.0);
    }

    #[tokio::test]
    async fn reference_counts_bump() {
        let (store, page_id) = store_with_page().await;
        let b = bit(&page_id, "Traits define shared behavior", 0.5);
        let id = b.bit_id.clone();
        store.insert_bits(&[b]).await.unwrap();
        store.bump_reference_counts(&[id.clone()]).await.unwrap();
        store.bump_reference_counts(&[id]).await.unwrap();

        let filter = BitFilter {
            limit: 1,
            ..Default::default()
        };
        let found = store.query_bits(&filter).await.unwrap();
        assert_eq!(found[0].reference_count, 2);
    }

    #[tokio::test]
    async fn cross_refs_idempotent_on_triple() {
        let (store, page_id) = store_with_page().await;
        let a = bit(&page_id, "Vectors grow on the heap", 0.5);
        let b = bit(&page_id, "Slices view contiguous memory", 0.5);
        let (a_id, b_id) = (a.bit_id.clone(), b.bit_id.clone());
        store.insert_bits(&[a, b]).await.unwrap();

        let xref = CrossReference {
            source_bit_id: a_id.clone(),
            target_bit_id: b_id,
            relation_type: RelationType::Related,
            strength: 0.6,
            created_at: Utc::now(),
        };
        store.insert_cross_refs(&[xref.clone(), xref]).await.unwrap();
        assert_eq!(store.list_cross_refs(&a_id).await.unwrap().len(), 1);
    }
}
