//! Background crawl scheduling: four priority queues, a fixed worker
//! pool, per-job timeouts, bounded retries, and cooperative cancellation.
//!
//! Workers never preempt: a higher-priority job waits for the next idle
//! worker, which always drains the highest non-empty queue first.

use crate::core::app_state::Core;
use crate::core::error::{CrawlError, Result};
use crate::core::types::{CrawlJob, CrawlOutcome, JobPriority, JobState, JobStatusView};
use crate::crawler::{self, CrawlConfig};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Configuration for the scheduler worker pool.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Worker pool size — caps in-flight crawl jobs.
    pub max_concurrent_tasks: usize,
    /// Per-job deadline.
    pub task_timeout: Duration,
    /// Retries granted on timeout or transient failure.
    pub retry_attempts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 3,
            task_timeout: Duration::from_secs(300),
            retry_attempts: 3,
        }
    }
}

/// A submitted crawl request.
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// Caller-chosen id; generated when absent.
    pub job_id: Option<String>,
    pub seed_url: String,
    pub config: CrawlConfig,
    pub priority: JobPriority,
}

struct JobEntry {
    job: CrawlJob,
    cancel: CancellationToken,
}

pub struct Scheduler {
    core: Arc<Core>,
    config: SchedulerConfig,
    /// One FIFO queue per priority, critical first.
    queues: Mutex<[VecDeque<String>; 4]>,
    jobs: RwLock<HashMap<String, JobEntry>>,
    notify: Notify,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(core: Arc<Core>, config: SchedulerConfig) -> Arc<Self> {
        Arc::new(Self {
            core,
            config,
            queues: Mutex::new(Default::default()),
            jobs: RwLock::new(HashMap::new()),
            notify: Notify::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Spawn the worker pool. Idempotent per scheduler instance only in
    /// the sense that callers invoke it once at startup.
    pub fn start(self: &Arc<Self>) {
        for worker_id in 0..self.config.max_concurrent_tasks {
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.worker_loop(worker_id).await;
            });
        }
        info!(
            "scheduler started with {} workers (timeout {:?}, retries {})",
            self.config.max_concurrent_tasks, self.config.task_timeout, self.config.retry_attempts
        );
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
        self.notify.notify_waiters();
    }

    /// Enqueue a background crawl. The job is persisted as `queued` before
    /// the ack so status survives a restart.
    pub async fn submit(&self, spec: JobSpec) -> Result<String> {
        validate_seed(&spec.seed_url)?;

        let job_id = match spec.job_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => Uuid::new_v4().to_string(),
        };

        {
            let jobs = self.jobs.read().await;
            if jobs.contains_key(&job_id) {
                return Err(CrawlError::BadInput(format!(
                    "job '{}' already exists",
                    job_id
                )));
            }
        }

        let job = CrawlJob {
            job_id: job_id.clone(),
            seed_url: spec.seed_url,
            config: spec.config,
            state: JobState::Queued,
            priority: spec.priority,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            attempts: 0,
            failure_reason: None,
            metrics: Default::default(),
        };
        self.core.store.record_job(&job).await?;

        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(
                job_id.clone(),
                JobEntry {
                    job,
                    cancel: self.shutdown.child_token(),
                },
            );
        }
        self.enqueue(spec.priority, &job_id).await;

        debug!("job {} queued at priority {}", job_id, spec.priority.as_str());
        Ok(job_id)
    }

    /// Status of one job, or of every known job when `job_id` is None.
    pub async fn status(&self, job_id: Option<&str>) -> Result<Vec<JobStatusView>> {
        let jobs = self.jobs.read().await;
        match job_id {
            Some(id) => match jobs.get(id) {
                Some(entry) => Ok(vec![status_view(&entry.job)]),
                None => Err(CrawlError::BadInput(format!("unknown job '{}'", id))),
            },
            None => {
                let mut views: Vec<JobStatusView> =
                    jobs.values().map(|e| status_view(&e.job)).collect();
                views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Ok(views)
            }
        }
    }

    /// Request cooperative cancellation. Queued jobs cancel immediately;
    /// running jobs stop at their next suspension point.
    pub async fn cancel(&self, job_id: &str) -> Result<JobState> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| CrawlError::BadInput(format!("unknown job '{}'", job_id)))?;

        match entry.job.state {
            JobState::Queued => {
                entry.job.state = JobState::Cancelled;
                entry.job.ended_at = Some(Utc::now());
                self.core.store.update_job(&entry.job).await?;
                // Remove from whatever queue holds it.
                let mut queues = self.queues.lock().await;
                for queue in queues.iter_mut() {
                    queue.retain(|id| id != job_id);
                }
                info!("job {} cancelled while queued", job_id);
            }
            JobState::Running => {
                entry.cancel.cancel();
                info!("job {} cancellation requested", job_id);
            }
            state if state.is_terminal() => {
                debug!("cancel on terminal job {} ({})", job_id, state.as_str());
            }
            _ => {
                entry.cancel.cancel();
            }
        }
        Ok(entry.job.state)
    }

    /// Run a crawl inline, bypassing the queue: the `crawl_website` tool
    /// blocks until the job finishes and wants the outcome in one shot.
    /// The job is still registered so `get_background_crawl_status` sees
    /// it.
    pub async fn run_inline(&self, spec: JobSpec) -> Result<CrawlOutcome> {
        validate_seed(&spec.seed_url)?;
        let job_id = match spec.job_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => Uuid::new_v4().to_string(),
        };

        let cancel = self.shutdown.child_token();
        let mut job = CrawlJob {
            job_id: job_id.clone(),
            seed_url: spec.seed_url,
            config: spec.config,
            state: JobState::Running,
            priority: spec.priority,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            ended_at: None,
            attempts: 1,
            failure_reason: None,
            metrics: Default::default(),
        };
        self.core.store.record_job(&job).await?;
        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(
                job_id.clone(),
                JobEntry {
                    job: job.clone(),
                    cancel: cancel.clone(),
                },
            );
        }

        let started = tokio::time::Instant::now();
        let outcome =
            tokio::time::timeout(self.config.task_timeout, crawler::run_crawl(&self.core, &mut job, &cancel))
                .await;

        job.ended_at = Some(Utc::now());
        job.state = match &outcome {
            Ok(Ok(())) => JobState::Completed,
            Ok(Err(CrawlError::Cancelled)) => JobState::Cancelled,
            Ok(Err(e)) => {
                job.failure_reason = Some(e.to_string());
                JobState::Failed
            }
            Err(_) => {
                cancel.cancel();
                JobState::TimedOut
            }
        };
        self.core.store.update_job(&job).await?;
        self.write_back(&job).await;

        match outcome {
            Ok(Err(e)) if !matches!(e, CrawlError::Cancelled) => return Err(e),
            _ => {}
        }

        Ok(CrawlOutcome {
            job_id,
            seed_url: job.seed_url.clone(),
            pages_crawled: job.metrics.pages_fetched,
            bits_extracted: job.metrics.bits_emitted,
            duration_ms: started.elapsed().as_millis() as u64,
            state: job.state,
            metrics: job.metrics,
        })
    }

    async fn enqueue(&self, priority: JobPriority, job_id: &str) {
        let mut queues = self.queues.lock().await;
        queues[priority.index()].push_back(job_id.to_string());
        drop(queues);
        self.notify.notify_one();
    }

    /// Pop from the highest-priority non-empty queue.
    async fn next_job(&self) -> Option<String> {
        let mut queues = self.queues.lock().await;
        queues.iter_mut().find_map(|q| q.pop_front())
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize) {
        debug!("scheduler worker {} up", worker_id);
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let Some(job_id) = self.next_job().await else {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = self.notify.notified() => {}
                    // Safety-net poll: a lost wakeup only delays dispatch.
                    _ = tokio::time::sleep(Duration::from_millis(250)) => {}
                }
                continue;
            };

            self.run_one(&job_id).await;
        }
        debug!("scheduler worker {} down", worker_id);
    }

    async fn run_one(&self, job_id: &str) {
        // Snapshot the job and its token out of the registry.
        let (mut job, cancel) = {
            let mut jobs = self.jobs.write().await;
            let Some(entry) = jobs.get_mut(job_id) else {
                warn!("queued job {} vanished from registry", job_id);
                return;
            };
            if entry.job.state == JobState::Cancelled {
                return;
            }
            entry.job.state = JobState::Running;
            entry.job.started_at = Some(Utc::now());
            entry.job.attempts += 1;
            (entry.job.clone(), entry.cancel.clone())
        };

        if let Err(e) = self.core.store.update_job(&job).await {
            error!("failed to persist job {} transition to running: {}", job_id, e);
        }

        let outcome = tokio::time::timeout(
            self.config.task_timeout,
            crawler::run_crawl(&self.core, &mut job, &cancel),
        )
        .await;

        let retry_allowed = job.attempts <= self.config.retry_attempts;
        match outcome {
            Ok(Ok(())) => {
                job.state = JobState::Completed;
                job.ended_at = Some(Utc::now());
                info!(
                    "job {} completed: {} pages, {} bits",
                    job_id, job.metrics.pages_fetched, job.metrics.bits_emitted
                );
            }
            Ok(Err(CrawlError::Cancelled)) => {
                job.state = JobState::Cancelled;
                job.ended_at = Some(Utc::now());
                info!("job {} cancelled", job_id);
            }
            Ok(Err(e)) if e.is_transient() && retry_allowed => {
                warn!("job {} hit transient error ({}), re-queueing", job_id, e);
                job.state = JobState::Queued;
                job.failure_reason = Some(e.to_string());
            }
            Ok(Err(e)) => {
                job.state = JobState::Failed;
                job.failure_reason = Some(e.to_string());
                job.ended_at = Some(Utc::now());
                warn!("job {} failed: {}", job_id, e);
            }
            Err(_elapsed) => {
                // Cancel the crawl cooperatively, then decide on retry.
                cancel.cancel();
                job.state = JobState::TimedOut;
                job.failure_reason = Some(format!(
                    "timed out after {:?}",
                    self.config.task_timeout
                ));
                warn!("job {} timed out (attempt {})", job_id, job.attempts);
                // Make the timed-out transition observable before the
                // retry decision lands.
                if let Err(e) = self.core.store.update_job(&job).await {
                    error!("failed to persist job {} timeout: {}", job_id, e);
                }
                if retry_allowed {
                    job.state = JobState::Queued;
                } else {
                    job.state = JobState::Failed;
                    job.ended_at = Some(Utc::now());
                    job.failure_reason = Some(format!(
                        "timed out after {:?} ({} attempts, retries exhausted)",
                        self.config.task_timeout, job.attempts
                    ));
                }
            }
        }

        if let Err(e) = self.core.store.update_job(&job).await {
            error!("failed to persist job {} result: {}", job_id, e);
        }

        let requeue = job.state == JobState::Queued;
        let priority = job.priority;

        {
            let mut jobs = self.jobs.write().await;
            if let Some(entry) = jobs.get_mut(job_id) {
                // Timed-out attempts need a fresh token for the retry.
                if requeue {
                    entry.cancel = self.shutdown.child_token();
                }
                entry.job = job;
            }
        }

        if requeue {
            self.enqueue(priority, job_id).await;
        }
    }

    async fn write_back(&self, job: &CrawlJob) {
        let mut jobs = self.jobs.write().await;
        if let Some(entry) = jobs.get_mut(&job.job_id) {
            entry.job = job.clone();
        }
    }
}

fn validate_seed(raw: &str) -> Result<()> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CrawlError::BadInput("empty seed url".to_string()));
    }
    let url = url::Url::parse(trimmed)
        .map_err(|e| CrawlError::BadInput(format!("invalid seed url '{}': {}", trimmed, e)))?;
    if url.host_str().is_none() || (url.scheme() != "http" && url.scheme() != "https") {
        return Err(CrawlError::BadInput(format!(
            "seed url must be absolute http(s): {}",
            trimmed
        )));
    }
    Ok(())
}

fn status_view(job: &CrawlJob) -> JobStatusView {
    let elapsed_ms = job.started_at.map(|start| {
        let end = job.ended_at.unwrap_or_else(Utc::now);
        (end - start).num_milliseconds().max(0) as u64
    });
    JobStatusView {
        job_id: job.job_id.clone(),
        seed_url: job.seed_url.clone(),
        state: job.state,
        priority: job.priority,
        attempts: job.attempts,
        created_at: job.created_at,
        started_at: job.started_at,
        elapsed_ms,
        failure_reason: job.failure_reason.clone(),
        metrics: job.metrics.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_validation() {
        assert!(validate_seed("http://example.test/").is_ok());
        assert!(validate_seed("").is_err());
        assert!(validate_seed("ftp://example.test/").is_err());
        assert!(validate_seed("relative/path").is_err());
    }

    #[test]
    fn scheduler_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_concurrent_tasks, 3);
        assert_eq!(config.task_timeout, Duration::from_secs(300));
        assert_eq!(config.retry_attempts, 3);
    }
}
