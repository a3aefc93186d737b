use super::{store_err, Store};
use crate::core::error::Result;
use crate::core::types::{LearningStatistics, WebSearchResult};
use chrono::Utc;
use libsql::params;
use std::collections::HashMap;

impl Store {
    /// Aggregate report over the whole corpus: distributions, top source
    /// domains, score averages, and a 7-day activity window.
    pub async fn learning_statistics(&self) -> Result<LearningStatistics> {
        let conn = self.connect()?;

        let total_learning_bits = scalar_u64(
            &conn,
            "SELECT COUNT(*) FROM learning_bits WHERE deleted = 0",
        )
        .await?;
        let total_crawled_pages = scalar_u64(&conn, "SELECT COUNT(*) FROM pages").await?;

        let category_distribution = grouped_counts(
            &conn,
            "SELECT category, COUNT(*) FROM learning_bits WHERE deleted = 0 GROUP BY category ORDER BY COUNT(*) DESC",
        )
        .await?;
        let content_type_distribution = grouped_counts(
            &conn,
            "SELECT content_type, COUNT(*) FROM learning_bits WHERE deleted = 0 GROUP BY content_type ORDER BY COUNT(*) DESC",
        )
        .await?;
        let complexity_distribution = grouped_counts(
            &conn,
            "SELECT complexity_level, COUNT(*) FROM learning_bits WHERE deleted = 0 GROUP BY complexity_level ORDER BY COUNT(*) DESC",
        )
        .await?;

        let mut top_source_domains = Vec::new();
        let mut rows = conn
            .query(
                r#"
                SELECT p.domain, COUNT(b.bit_id) AS bit_count
                FROM learning_bits b
                JOIN pages p ON b.page_id = p.page_id
                WHERE b.deleted = 0
                GROUP BY p.domain
                ORDER BY bit_count DESC
                LIMIT 10
                "#,
                (),
            )
            .await
            .map_err(store_err)?;
        while let Some(row) = rows.next().await.map_err(store_err)? {
            let domain: String = row.get(0).map_err(store_err)?;
            let count: i64 = row.get(1).map_err(store_err)?;
            top_source_domains.push((domain, count as u64));
        }

        let (average_importance, average_confidence, average_references) = {
            let mut rows = conn
                .query(
                    r#"
                    SELECT AVG(importance_score), AVG(confidence_score), AVG(reference_count)
                    FROM learning_bits WHERE deleted = 0
                    "#,
                    (),
                )
                .await
                .map_err(store_err)?;
            match rows.next().await.map_err(store_err)? {
                Some(row) => (
                    row.get::<f64>(0).ok().unwrap_or(0.0),
                    row.get::<f64>(1).ok().unwrap_or(0.0),
                    row.get::<f64>(2).ok().unwrap_or(0.0),
                ),
                None => (0.0, 0.0, 0.0),
            }
        };

        let week_ago = Utc::now().timestamp() - 7 * 24 * 3600;
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM learning_bits WHERE deleted = 0 AND extracted_at >= ?",
                params![week_ago],
            )
            .await
            .map_err(store_err)?;
        let bits_last_7_days = match rows.next().await.map_err(store_err)? {
            Some(row) => row.get::<i64>(0).map_err(store_err)? as u64,
            None => 0,
        };

        Ok(LearningStatistics {
            total_learning_bits,
            total_crawled_pages,
            category_distribution,
            content_type_distribution,
            complexity_distribution,
            top_source_domains,
            average_importance: round3(average_importance),
            average_confidence: round3(average_confidence),
            average_references: round3(average_references),
            bits_last_7_days,
            generated_at: Utc::now(),
        })
    }

    /// Log a dispatched web search and its returned URLs. One row per
    /// result so dedupe behavior stays inspectable after the fact.
    pub async fn record_search(&self, query: &str, results: &[WebSearchResult]) -> Result<()> {
        let _guard = self.write_guard().await;
        let conn = self.connect()?;
        conn.execute("BEGIN TRANSACTION", ()).await.map_err(store_err)?;
        for result in results {
            let engine = result.providers.join(",");
            if let Err(e) = conn
                .execute(
                    r#"
                    INSERT INTO search_log (query, engine, url, title, snippet, relevance)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                    params![
                        query,
                        engine,
                        result.url.clone(),
                        result.title.clone(),
                        result.snippet.clone(),
                        result.relevance,
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

    pub async fn count_searches(&self) -> Result<u64> {
        let conn = self.connect()?;
        scalar_u64(&conn, "SELECT COUNT(DISTINCT query) FROM search_log").await
    }
}

async fn scalar_u64(conn: &libsql::Connection, sql: &str) -> Result<u64> {
    let mut rows = conn.query(sql, ()).await.map_err(store_err)?;
    match rows.next().await.map_err(store_err)? {
        Some(row) => {
            let n: i64 = row.get(0).map_err(store_err)?;
            Ok(n as u64)
        }
        None => Ok(0),
    }
}

async fn grouped_counts(conn: &libsql::Connection, sql: &str) -> Result<HashMap<String, u64>> {
    let mut rows = conn.query(sql, ()).await.map_err(store_err)?;
    let mut out = HashMap::new();
    while let Some(row) = rows.next().await.map_err(store_err)? {
        let key: String = row.get(0).map_err(store_err)?;
        let count: i64 = row.get(1).map_err(store_err)?;
        out.insert(key, count as u64);
    }
    Ok(out)
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::*;

    #[tokio::test]
    async fn empty_store_reports_zeroes() {
        let store = Store::open(":memory:").await.unwrap();
        let stats = store.learning_statistics().await.unwrap();
        assert_eq!(stats.total_learning_bits, 0);
        assert_eq!(stats.total_crawled_pages, 0);
        assert!(stats.category_distribution.is_empty());
        assert_eq!(stats.average_importance, 0.0);
    }

    #[tokio::test]
    async fn distributions_and_domains_aggregate() {
        let store = Store::open(":memory:").await.unwrap();
        let page = Page {
            page_id: page_id_for("http://docs.test/a"),
            url: "http://docs.test/a".to_string(),
            domain: "docs.test".to_string(),
            depth: 0,
            fetched_at: Utc::now(),
            last_seen: Utc::now(),
            content_hash: "h1".to_string(),
            status: PageStatus::Fetched,
            title: None,
            language: None,
            byte_length: 10,
            reference_count: 0,
        };
        store.upsert_page(&page).await.unwrap();

        let mk = |content: &str, category: &str| LearningBit {
            bit_id: bit_id_for(&page.page_id, content),
            page_id: page.page_id.clone(),
            content: content.to_string(),
            context: String::new(),
            content_type: ContentType::Concept,
            category: category.to_string(),
            subcategory: None,
            complexity_level: ComplexityLevel::Beginner,
            importance_score: 0.5,
            confidence_score: 0.7,
            tags: vec![],
            extracted_at: Utc::now(),
            reference_count: 0,
        };
        store
            .insert_bits(&[
                mk("Iterators are lazy", "programming"),
                mk("Closures capture environment", "programming"),
                mk("A sonnet has fourteen lines", "writing"),
            ])
            .await
            .unwrap();

        let stats = store.learning_statistics().await.unwrap();
        assert_eq!(stats.total_learning_bits, 3);
        assert_eq!(stats.category_distribution["programming"], 2);
        assert_eq!(stats.top_source_domains[0], ("docs.test".to_string(), 3));
        assert_eq!(stats.bits_last_7_days, 3);
        assert!((stats.average_confidence - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn search_log_records_rows() {
        let store = Store::open(":memory:").await.unwrap();
        let results = vec![WebSearchResult {
            url: "http://x.test/a".to_string(),
            title: "A".to_string(),
            snippet: "alpha".to_string(),
            providers: vec!["duckduckgo".to_string()],
            rank: 1,
            relevance: 0.9,
        }];
        store.record_search("alpha", &results).await.unwrap();
        assert_eq!(store.count_searches().await.unwrap(), 1);
    }
}
