use super::{store_err, ts_to_datetime, Store};
use crate::core::error::{CrawlError, Result};
use crate::core::types::{CrawlJob, JobPriority, JobState};
use libsql::params;

impl Store {
    /// Persist a freshly submitted job (state `queued`).
    pub async fn record_job(&self, job: &CrawlJob) -> Result<()> {
        let _guard = self.write_guard().await;
        let conn = self.connect()?;
        let config_json = serde_json::to_string(&job.config)
            .map_err(|e| CrawlError::StoreUnavailable(e.to_string()))?;
        let metrics_json = serde_json::to_string(&job.metrics)
            .map_err(|e| CrawlError::StoreUnavailable(e.to_string()))?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO crawl_jobs
                (job_id, seed_url, config, state, priority, created_at,
                 started_at, ended_at, attempts, failure_reason, metrics)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                job.job_id.clone(),
                job.seed_url.clone(),
                config_json,
                job.state.as_str(),
                job.priority as i64,
                job.created_at.timestamp(),
                job.started_at.map(|t| t.timestamp()),
                job.ended_at.map(|t| t.timestamp()),
                job.attempts as i64,
                job.failure_reason.clone(),
                metrics_json,
            ],
        )
        .await
        .map_err(store_err)?;
        Ok(())
    }

    /// Refresh the mutable portion of a job row as it moves through the
    /// state machine.
    pub async fn update_job(&self, job: &CrawlJob) -> Result<()> {
        let _guard = self.write_guard().await;
        let conn = self.connect()?;
        let metrics_json = serde_json::to_string(&job.metrics)
            .map_err(|e| CrawlError::StoreUnavailable(e.to_string()))?;

        conn.execute(
            r#"
            UPDATE crawl_jobs SET
                state = ?, started_at = ?, ended_at = ?, attempts = ?,
                failure_reason = ?, metrics = ?
            WHERE job_id = ?
            "#,
            params![
                job.state.as_str(),
                job.started_at.map(|t| t.timestamp()),
                job.ended_at.map(|t| t.timestamp()),
                job.attempts as i64,
                job.failure_reason.clone(),
                metrics_json,
                job.job_id.clone(),
            ],
        )
        .await
        .map_err(store_err)?;
        Ok(())
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Option<CrawlJob>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                r#"
                SELECT job_id, seed_url, config, state, priority, created_at,
                       started_at, ended_at, attempts, failure_reason, metrics
                FROM crawl_jobs WHERE job_id = ?
                "#,
                params![job_id],
            )
            .await
            .map_err(store_err)?;
        match rows.next().await.map_err(store_err)? {
            Some(row) => Ok(Some(row_to_job(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_jobs(&self, state: Option<JobState>) -> Result<Vec<CrawlJob>> {
        let conn = self.connect()?;
        let mut rows = match state {
            Some(state) => conn
                .query(
                    r#"
                    SELECT job_id, seed_url, config, state, priority, created_at,
                           started_at, ended_at, attempts, failure_reason, metrics
                    FROM crawl_jobs WHERE state = ? ORDER BY created_at DESC
                    "#,
                    params![state.as_str()],
                )
                .await
                .map_err(store_err)?,
            None => conn
                .query(
                    r#"
                    SELECT job_id, seed_url, config, state, priority, created_at,
                           started_at, ended_at, attempts, failure_reason, metrics
                    FROM crawl_jobs ORDER BY created_at DESC
                    "#,
                    (),
                )
                .await
                .map_err(store_err)?,
        };

        let mut jobs = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_err)? {
            jobs.push(row_to_job(&row)?);
        }
        Ok(jobs)
    }
}

fn row_to_job(row: &libsql::Row) -> Result<CrawlJob> {
    let config_json: String = row.get(2).map_err(store_err)?;
    let state_raw: String = row.get(3).map_err(store_err)?;
    let priority_raw: i64 = row.get(4).map_err(store_err)?;
    let metrics_json: String = row.get(10).map_err(store_err)?;

    let priority = match priority_raw {
        1 => JobPriority::Critical,
        2 => JobPriority::High,
        4 => JobPriority::Low,
        _ => JobPriority::Normal,
    };

    Ok(CrawlJob {
        job_id: row.get(0).map_err(store_err)?,
        seed_url: row.get(1).map_err(store_err)?,
        config: serde_json::from_str(&config_json).unwrap_or_default(),
        state: JobState::parse_str(&state_raw).unwrap_or(JobState::Failed),
        priority,
        created_at: ts_to_datetime(row.get(5).map_err(store_err)?),
        started_at: row.get::<i64>(6).ok().map(ts_to_datetime),
        ended_at: row.get::<i64>(7).ok().map(ts_to_datetime),
        attempts: row.get::<i64>(8).map_err(store_err)? as u32,
        failure_reason: row.get(9).ok(),
        metrics: serde_json::from_str(&metrics_json).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn job(id: &str) -> CrawlJob {
        CrawlJob {
            job_id: id.to_string(),
            seed_url: "http://example.test/".to_string(),
            config: crate::crawler::CrawlConfig::default(),
            state: JobState::Queued,
            priority: JobPriority::Normal,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            attempts: 0,
            failure_reason: None,
            metrics: Default::default(),
        }
    }

    #[tokio::test]
    async fn record_and_reload_round_trips() {
        let store = Store::open(":memory:").await.unwrap();
        let mut j = job("job-1");
        store.record_job(&j).await.unwrap();

        j.state = JobState::Running;
        j.started_at = Some(Utc::now());
        j.attempts = 1;
        j.metrics.pages_fetched = 4;
        store.update_job(&j).await.unwrap();

        let loaded = store.get_job("job-1").await.unwrap().unwrap();
        assert_eq!(loaded.state, JobState::Running);
        assert_eq!(loaded.attempts, 1);
        assert_eq!(loaded.metrics.pages_fetched, 4);
    }

    #[tokio::test]
    async fn list_filters_by_state() {
        let store = Store::open(":memory:").await.unwrap();
        store.record_job(&job("a")).await.unwrap();
        let mut done = job("b");
        done.state = JobState::Completed;
        store.record_job(&done).await.unwrap();

        let queued = store.list_jobs(Some(JobState::Queued)).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].job_id, "a");
        assert_eq!(store.list_jobs(None).await.unwrap().len(), 2);
    }
}
