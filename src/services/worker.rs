//! Fixed-size pool of scrape workers.
//!
//! Each worker is an independent loop:
//!
//! ```text
//! Worker
//!     │
//!     ├─► JobQueue::next_job (suspends while the queue is empty)
//!     ├─► Extractor::extract in its own task, bounded by the job budget
//!     ├─► sanitize records (drop malformed, cap at limit)
//!     ├─► JobQueue::complete / JobQueue::fail
//!     └─► archive terminal snapshot (optional)
//! ```
//!
//! The pool size is the only admission control: at most `concurrency`
//! extractions, and so at most that many headless browser sessions, run at
//! once.
//!
//! A job's budget is `job_timeout + limit * record_timeout`. The extractor
//! sees it as a soft deadline and returns what it has once it passes; the
//! task is aborted only `timeout_grace` later.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::models::job::{FailureKind, JobStatus, ScrapeJob};
use crate::models::lead::Lead;
use crate::services::archive::JobArchive;
use crate::services::extraction::{sanitize_records, ExtractionError, Extractor, SearchQuery};
use crate::services::queue::{ActiveJob, JobQueue};

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of jobs allowed to run at once
    pub concurrency: usize,
    /// Longest an idle worker sleeps before re-checking the queue
    pub poll_interval: Duration,
    /// Budget for a job before any records, covering the search load
    pub job_timeout: Duration,
    /// Budget added per requested record
    pub record_timeout: Duration,
    /// How long past its deadline an extraction may run before it is aborted
    pub timeout_grace: Duration,
    /// How often terminal jobs are checked against the retention policy
    pub sweep_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            poll_interval: Duration::from_millis(1000),
            job_timeout: Duration::from_secs(90),
            record_timeout: Duration::from_secs(10),
            timeout_grace: Duration::from_secs(15),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl WorkerPoolConfig {
    /// Soft budget for a job that asks for `limit` records.
    pub fn budget(&self, limit: usize) -> Duration {
        let per_record = u32::try_from(limit).unwrap_or(u32::MAX);
        self.job_timeout
            .saturating_add(self.record_timeout.saturating_mul(per_record))
    }
}

/// How long workers get to record failures once running jobs are aborted.
const ABORT_WAIT: Duration = Duration::from_secs(5);

type ExtractionTask = JoinHandle<Result<Vec<Lead>, ExtractionError>>;

/// Running set of workers plus the retention janitor.
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    tasks: JoinSet<()>,
    /// Stops workers from taking new jobs.
    shutdown: CancellationToken,
    /// Aborts jobs that are still running after the shutdown grace.
    abort: CancellationToken,
    size: usize,
}

impl WorkerPool {
    /// Spawn `config.concurrency` workers on the current runtime.
    pub fn spawn(
        queue: Arc<JobQueue>,
        extractor: Arc<dyn Extractor>,
        archive: Option<Arc<dyn JobArchive>>,
        config: WorkerPoolConfig,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let abort = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let size = config.concurrency.max(1);

        for index in 0..size {
            let worker = Worker {
                index,
                queue: queue.clone(),
                extractor: extractor.clone(),
                archive: archive.clone(),
                config: config.clone(),
                abort: abort.clone(),
            };
            tasks.spawn(worker.run(shutdown.clone()));
        }

        tasks.spawn(sweep_loop(queue.clone(), config.sweep_interval, shutdown.clone()));

        info!(
            concurrency = size,
            job_timeout_secs = config.job_timeout.as_secs(),
            "Worker pool started"
        );

        Self {
            queue,
            tasks,
            shutdown,
            abort,
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Stop taking work and wait up to `grace` for running jobs to finish.
    ///
    /// Jobs still running after that are failed and their extractions
    /// aborted. Jobs still waiting in the queue are left as they are.
    pub async fn shutdown(mut self, grace: Duration) {
        self.queue.close().await;
        self.shutdown.cancel();

        let pending = self.queue.queue_depth().await;
        info!(
            active = self.queue.active_count().await,
            pending,
            "Worker pool shutting down"
        );

        if tokio::time::timeout(grace, drain(&mut self.tasks)).await.is_err() {
            warn!(
                grace_secs = grace.as_secs(),
                "Jobs still running after grace period, aborting them"
            );
            self.abort.cancel();

            if tokio::time::timeout(ABORT_WAIT, drain(&mut self.tasks)).await.is_err() {
                warn!("Workers did not stop, killing them");
                self.tasks.shutdown().await;
            }
        }

        info!("Worker pool stopped");
    }
}

struct Worker {
    index: usize,
    queue: Arc<JobQueue>,
    extractor: Arc<dyn Extractor>,
    archive: Option<Arc<dyn JobArchive>>,
    config: WorkerPoolConfig,
    abort: CancellationToken,
}

impl Worker {
    async fn run(self, shutdown: CancellationToken) {
        debug!(worker = self.index, "Worker started");

        loop {
            let job = tokio::select! {
                _ = shutdown.cancelled() => break,
                job = self.queue.next_job(self.config.poll_interval) => job,
            };

            match job {
                Some(job) => self.process(job).await,
                None => break,
            }
        }

        debug!(worker = self.index, "Worker stopped");
    }

    /// Drive one active job to a terminal state.
    async fn process(&self, job: ActiveJob) {
        let start = Instant::now();

        info!(
            job_id = %job.id,
            worker = self.index,
            niche = %job.request.niche,
            city = %job.request.city,
            limit = job.request.limit,
            "Processing scrape job"
        );

        let finished = match self.execute(&job).await {
            Ok(records) => {
                let (records, skipped) = sanitize_records(records, job.request.limit);
                if skipped > 0 {
                    metrics::counter!("scrape_records_skipped_total").increment(skipped as u64);
                    warn!(job_id = %job.id, skipped, "Dropped malformed records");
                }
                self.queue.complete(job.id, records).await
            }
            Err((kind, message)) => {
                error!(job_id = %job.id, kind = %kind, error = %message, "Scrape job failed");
                self.queue.fail(job.id, kind, message).await
            }
        };

        let elapsed = start.elapsed();
        metrics::histogram!("scrape_job_duration_seconds").record(elapsed.as_secs_f64());

        match finished {
            Ok(snapshot) => {
                self.record_outcome(&snapshot, elapsed);
                self.archive(&snapshot).await;
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to store job outcome");
            }
        }
    }

    /// Run the extractor in its own task so a panic or timeout is contained
    /// to this job.
    async fn execute(&self, job: &ActiveJob) -> Result<Vec<Lead>, (FailureKind, String)> {
        let budget = self.config.budget(job.request.limit);
        let now = tokio::time::Instant::now();
        let query = SearchQuery::from(&job.request).with_deadline(now.checked_add(budget));
        let hard_limit = budget.saturating_add(self.config.timeout_grace);

        let extractor = self.extractor.clone();
        let progress = job.progress.clone();
        let mut task = tokio::spawn(async move { extractor.extract(&query, progress).await });

        let outcome = tokio::select! {
            joined = tokio::time::timeout(hard_limit, &mut task) => Some(joined),
            _ = self.abort.cancelled() => None,
        };

        match outcome {
            Some(Ok(Ok(Ok(records)))) => Ok(records),
            Some(Ok(Ok(Err(e)))) => Err((e.kind(), e.to_string())),
            Some(Ok(Err(join_err))) => Err((
                FailureKind::Panicked,
                format!("extraction task crashed: {join_err}"),
            )),
            Some(Err(_)) => {
                stop_extraction(task).await;
                Err((
                    FailureKind::Timeout,
                    format!("job timed out after {hard_limit:?}"),
                ))
            }
            None => {
                stop_extraction(task).await;
                Err((
                    FailureKind::Shutdown,
                    "service shut down before the job finished".to_string(),
                ))
            }
        }
    }

    fn record_outcome(&self, job: &ScrapeJob, elapsed: Duration) {
        match job.status {
            JobStatus::Completed => {
                metrics::counter!("scrape_jobs_completed_total").increment(1);
                info!(
                    job_id = %job.id,
                    worker = self.index,
                    records = job.result.as_ref().map_or(0, Vec::len),
                    duration_ms = elapsed.as_millis() as u64,
                    "Scrape job completed"
                );
            }
            JobStatus::Failed => {
                let kind = job
                    .error_kind
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                metrics::counter!("scrape_jobs_failed_total", "kind" => kind).increment(1);
            }
            JobStatus::Waiting | JobStatus::Active => {}
        }
    }

    async fn archive(&self, job: &ScrapeJob) {
        let Some(archive) = &self.archive else {
            return;
        };
        let ttl = self.queue.retention().ttl;
        if let Err(e) = archive.store(job, ttl).await {
            warn!(job_id = %job.id, error = %e, "Failed to archive job snapshot");
        }
    }
}

/// Abort an extraction and wait until its future is dropped, releasing
/// whatever browser session it held.
async fn stop_extraction(task: ExtractionTask) {
    task.abort();
    let _ = task.await;
}

async fn drain(tasks: &mut JoinSet<()>) {
    while tasks.join_next().await.is_some() {}
}

async fn sweep_loop(queue: Arc<JobQueue>, every: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let evicted = queue.evict_expired().await;
                if evicted > 0 {
                    debug!(evicted, "Evicted expired jobs");
                }
            }
        }
    }
}
