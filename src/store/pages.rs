use super::{store_err, ts_to_datetime, Store};
use crate::core::error::Result;
use crate::core::types::{Page, PageStatus};
use libsql::params;
use tracing::debug;

impl Store {
    /// Insert a page, or refresh `last_seen` when the id already exists.
    /// A re-fetch with identical content never creates a second row.
    pub async fn upsert_page(&self, page: &Page) -> Result<()> {
        let _guard = self.write_guard().await;
        self.with_retries("upsert_page", || async {
            let conn = self.connect()?;
            conn.execute(
                r#"
                INSERT INTO pages (
                    page_id, url, domain, depth, fetched_at, last_seen,
                    content_hash, status, title, language, byte_length, reference_count
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(page_id) DO UPDATE SET
                    last_seen = excluded.last_seen,
                    status = excluded.status
                "#,
                params![
                    page.page_id.clone(),
                    page.url.clone(),
                    page.domain.clone(),
                    page.depth as i64,
                    page.fetched_at.timestamp(),
                    page.last_seen.timestamp(),
                    page.content_hash.clone(),
                    page.status.as_str(),
                    page.title.clone(),
                    page.language.clone(),
                    page.byte_length as i64,
                    page.reference_count as i64,
                ],
            )
            .await
            .map_err(store_err)?;
            Ok(())
        })
        .await?;

        debug!("upserted page {} ({})", page.page_id, page.url);
        Ok(())
    }

    pub async fn get_page(&self, page_id: &str) -> Result<Option<Page>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                r#"
                SELECT page_id, url, domain, depth, fetched_at, last_seen,
                       content_hash, status, title, language, byte_length, reference_count
                FROM pages WHERE page_id = ?
                "#,
                params![page_id],
            )
            .await
            .map_err(store_err)?;

        match rows.next().await.map_err(store_err)? {
            Some(row) => Ok(Some(row_to_page(&row)?)),
            None => Ok(None),
        }
    }

    /// Page id of a previously stored body with this content hash, if any.
    /// Used by the crawler for cross-URL dedup within and across jobs.
    pub async fn find_page_by_content_hash(&self, content_hash: &str) -> Result<Option<String>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT page_id FROM pages WHERE content_hash = ? LIMIT 1",
                params![content_hash],
            )
            .await
            .map_err(store_err)?;
        match rows.next().await.map_err(store_err)? {
            Some(row) => Ok(Some(row.get(0).map_err(store_err)?)),
            None => Ok(None),
        }
    }

    pub async fn touch_page_last_seen(&self, page_id: &str) -> Result<()> {
        let _guard = self.write_guard().await;
        let conn = self.connect()?;
        conn.execute(
            "UPDATE pages SET last_seen = strftime('%s', 'now') WHERE page_id = ?",
            params![page_id],
        )
        .await
        .map_err(store_err)?;
        Ok(())
    }

    pub async fn count_pages(&self) -> Result<u64> {
        let conn = self.connect()?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM pages", ())
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
}

fn row_to_page(row: &libsql::Row) -> Result<Page> {
    let status_raw: String = row.get(7).map_err(store_err)?;
    Ok(Page {
        page_id: row.get(0).map_err(store_err)?,
        url: row.get(1).map_err(store_err)?,
        domain: row.get(2).map_err(store_err)?,
        depth: row.get::<i64>(3).map_err(store_err)? as usize,
        fetched_at: ts_to_datetime(row.get(4).map_err(store_err)?),
        last_seen: ts_to_datetime(row.get(5).map_err(store_err)?),
        content_hash: row.get(6).map_err(store_err)?,
        status: PageStatus::parse_str(&status_raw).unwrap_or(PageStatus::Fetched),
        title: row.get(8).ok(),
        language: row.get(9).ok(),
        byte_length: row.get::<i64>(10).map_err(store_err)? as usize,
        reference_count: row.get::<i64>(11).map_err(store_err)? as u64,
    })
}
