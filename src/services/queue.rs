use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::Utc;
use garde::Validate;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::models::job::{FailureKind, JobStatus, ScrapeJob};
use crate::models::lead::Lead;
use crate::models::scrape::ScrapeRequest;
use crate::services::progress::ProgressReporter;

/// How long terminal jobs stay pollable in memory.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Evict terminal jobs this long after they finished.
    pub ttl: Duration,
    /// Keep at most this many terminal jobs, oldest finished evicted first.
    pub max_terminal: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_terminal: 1000,
        }
    }
}

/// A job handed to a worker. Dequeueing already moved it to `active`.
#[derive(Debug)]
pub struct ActiveJob {
    pub id: Uuid,
    pub request: ScrapeRequest,
    pub caller_id: Option<String>,
    pub progress: ProgressReporter,
}

struct JobEntry {
    job: ScrapeJob,
    progress: ProgressReporter,
}

impl JobEntry {
    fn snapshot(&self) -> ScrapeJob {
        let mut job = self.job.clone();
        job.progress = self.progress.current();
        job
    }
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<Uuid, JobEntry>,
    pending: VecDeque<Uuid>,
    active: usize,
    closed: bool,
}

/// In-process job registry with FIFO admission.
///
/// Submission is cheap and never waits on execution; workers pull jobs with
/// [`JobQueue::next_job`]. All state sits behind one lock so the
/// waiting → active hand-off is atomic.
pub struct JobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: Option<usize>,
    retention: RetentionPolicy,
}

impl JobQueue {
    pub fn new(capacity: Option<usize>, retention: RetentionPolicy) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            capacity,
            retention,
        }
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Validate and enqueue a scrape request. Returns the new job id.
    pub async fn submit(
        &self,
        caller_id: Option<String>,
        request: ScrapeRequest,
    ) -> Result<Uuid, QueueError> {
        let request = request.normalized();
        request
            .validate()
            .map_err(|report| QueueError::InvalidInput(report.to_string()))?;

        let mut state = self.state.lock().await;
        if state.closed {
            return Err(QueueError::Closed);
        }
        if let Some(capacity) = self.capacity {
            if state.pending.len() >= capacity {
                return Err(QueueError::QueueFull { capacity });
            }
        }

        let id = Uuid::new_v4();
        state.jobs.insert(
            id,
            JobEntry {
                job: ScrapeJob::new(id, caller_id, request),
                progress: ProgressReporter::new(),
            },
        );
        state.pending.push_back(id);
        let depth = state.pending.len();
        drop(state);

        metrics::counter!("scrape_jobs_submitted_total").increment(1);
        metrics::gauge!("scrape_queue_depth").set(depth as f64);
        self.notify.notify_one();

        Ok(id)
    }

    /// Pop the oldest waiting job and mark it active.
    pub async fn dequeue_next(&self) -> Option<ActiveJob> {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        while let Some(id) = state.pending.pop_front() {
            // Only waiting jobs belong in the FIFO.
            let Some(entry) = state.jobs.get_mut(&id) else {
                continue;
            };
            if entry.job.status != JobStatus::Waiting {
                continue;
            }

            entry.job.status = JobStatus::Active;
            entry.job.started_at = Some(Utc::now());
            state.active += 1;

            metrics::gauge!("scrape_queue_depth").set(state.pending.len() as f64);
            metrics::gauge!("scrape_jobs_active").set(state.active as f64);

            return Some(ActiveJob {
                id,
                request: entry.job.request.clone(),
                caller_id: entry.job.caller_id.clone(),
                progress: entry.progress.clone(),
            });
        }

        None
    }

    /// Wait for the next job, waking on submission or every `poll_interval`.
    ///
    /// Returns `None` once the queue is closed and nothing is pending.
    pub async fn next_job(&self, poll_interval: Duration) -> Option<ActiveJob> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(job) = self.dequeue_next().await {
                return Some(job);
            }
            if self.is_closed().await {
                return None;
            }

            let _ = tokio::time::timeout(poll_interval, notified).await;
        }
    }

    /// Snapshot of a job for polling.
    pub async fn get(&self, id: Uuid) -> Result<ScrapeJob, QueueError> {
        let state = self.state.lock().await;
        state
            .jobs
            .get(&id)
            .map(JobEntry::snapshot)
            .ok_or(QueueError::NotFound(id))
    }

    /// Store the result of an active job and mark it completed.
    pub async fn complete(&self, id: Uuid, records: Vec<Lead>) -> Result<ScrapeJob, QueueError> {
        self.finish(id, |job, progress| {
            job.status = JobStatus::Completed;
            job.result = Some(records);
            progress.finish();
        })
        .await
    }

    /// Store the failure of an active job and mark it failed.
    pub async fn fail(
        &self,
        id: Uuid,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Result<ScrapeJob, QueueError> {
        let message = message.into();
        self.finish(id, |job, _| {
            job.status = JobStatus::Failed;
            job.error = Some(message);
            job.error_kind = Some(kind);
        })
        .await
    }

    async fn finish<F>(&self, id: Uuid, apply: F) -> Result<ScrapeJob, QueueError>
    where
        F: FnOnce(&mut ScrapeJob, &ProgressReporter),
    {
        let mut state = self.state.lock().await;
        let entry = state.jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;

        if entry.job.status != JobStatus::Active {
            return Err(QueueError::InvalidTransition {
                id,
                status: entry.job.status,
            });
        }

        apply(&mut entry.job, &entry.progress);
        entry.job.finished_at = Some(Utc::now());
        let snapshot = entry.snapshot();

        state.active = state.active.saturating_sub(1);
        metrics::gauge!("scrape_jobs_active").set(state.active as f64);

        Ok(snapshot)
    }

    /// Drop terminal jobs that fall outside the retention policy.
    pub async fn evict_expired(&self) -> usize {
        // A TTL too large to subtract from now means nothing is old enough.
        let cutoff = chrono::Duration::from_std(self.retention.ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl));

        let mut state = self.state.lock().await;
        let before = state.jobs.len();

        if let Some(cutoff) = cutoff {
            state.jobs.retain(|_, entry| match entry.job.finished_at {
                Some(finished) if entry.job.status.is_terminal() => finished > cutoff,
                _ => true,
            });
        }

        let mut terminal: Vec<_> = state
            .jobs
            .values()
            .filter(|entry| entry.job.status.is_terminal())
            .filter_map(|entry| entry.job.finished_at.map(|at| (at, entry.job.id)))
            .collect();

        if terminal.len() > self.retention.max_terminal {
            terminal.sort();
            let excess = terminal.len() - self.retention.max_terminal;
            for (_, id) in terminal.into_iter().take(excess) {
                state.jobs.remove(&id);
            }
        }

        let evicted = before - state.jobs.len();
        if evicted > 0 {
            metrics::counter!("scrape_jobs_evicted_total").increment(evicted as u64);
        }
        evicted
    }

    /// Pending jobs not yet picked up by a worker.
    pub async fn queue_depth(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Jobs currently held by workers.
    pub async fn active_count(&self) -> usize {
        self.state.lock().await.active
    }

    /// Jobs currently held in the registry, in any state.
    pub async fn len(&self) -> usize {
        self.state.lock().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stop accepting submissions and wake every idle worker.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("invalid scrape request: {0}")]
    InvalidInput(String),

    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("queue is full ({capacity} jobs waiting)")]
    QueueFull { capacity: usize },

    #[error("queue is closed")]
    Closed,

    #[error("job {id} is {status} and cannot be finished")]
    InvalidTransition { id: Uuid, status: JobStatus },
}
