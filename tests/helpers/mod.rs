//! Stub extractors and polling helpers for queue and API tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use leadgen_scraper::models::job::ScrapeJob;
use leadgen_scraper::models::lead::Lead;
use leadgen_scraper::services::archive::{ArchiveError, JobArchive};
use leadgen_scraper::models::scrape::ScrapeRequest;
use leadgen_scraper::services::extraction::{ExtractionError, Extractor, SearchQuery};
use leadgen_scraper::services::progress::{self, ProgressReporter};
use leadgen_scraper::services::queue::JobQueue;
use leadgen_scraper::services::worker::WorkerPoolConfig;
use tokio::time::{sleep, Instant};

use crate::fixtures::sample_leads;

pub fn request(niche: &str, city: &str, limit: usize) -> ScrapeRequest {
    ScrapeRequest {
        niche: niche.to_string(),
        city: city.to_string(),
        country: None,
        limit,
    }
}

/// Pool config with a short idle poll so tests stay fast.
pub fn pool_config(concurrency: usize) -> WorkerPoolConfig {
    WorkerPoolConfig {
        concurrency,
        poll_interval: Duration::from_millis(20),
        job_timeout: Duration::from_secs(5),
        record_timeout: Duration::ZERO,
        timeout_grace: Duration::ZERO,
        sweep_interval: Duration::from_secs(60),
    }
}

/// Poll until the job is completed or failed.
pub async fn wait_for_terminal(queue: &JobQueue, id: uuid::Uuid, timeout: Duration) -> ScrapeJob {
    let deadline = Instant::now() + timeout;
    loop {
        let job = queue.get(id).await.expect("job disappeared while polling");
        if job.status.is_terminal() {
            return job;
        }
        assert!(
            Instant::now() < deadline,
            "job {id} did not finish within {timeout:?} (status {})",
            job.status
        );
        sleep(Duration::from_millis(10)).await;
    }
}

/// Returns fixed records after walking through the usual milestones.
pub struct FixedExtractor {
    pub records: Vec<Lead>,
    pub step_delay: Duration,
}

impl FixedExtractor {
    pub fn new(records: Vec<Lead>) -> Self {
        Self {
            records,
            step_delay: Duration::ZERO,
        }
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }
}

#[async_trait]
impl Extractor for FixedExtractor {
    async fn extract(
        &self,
        _query: &SearchQuery,
        progress: ProgressReporter,
    ) -> Result<Vec<Lead>, ExtractionError> {
        progress.report(progress::SEARCH_LOADED);
        sleep(self.step_delay).await;
        progress.report(progress::CANDIDATES_FOUND);

        let total = self.records.len();
        for i in 0..total {
            sleep(self.step_delay).await;
            progress.record_processed(i + 1, total);
        }

        Ok(self.records.clone())
    }
}

/// Fails before producing anything, as when the search page never loads.
pub struct UnavailableExtractor;

#[async_trait]
impl Extractor for UnavailableExtractor {
    async fn extract(
        &self,
        _query: &SearchQuery,
        _progress: ProgressReporter,
    ) -> Result<Vec<Lead>, ExtractionError> {
        Err(ExtractionError::Unavailable(
            "search page did not load".to_string(),
        ))
    }
}

/// Sleeps, then returns `limit` leads, tracking how many calls overlap.
#[derive(Default)]
pub struct ConcurrencyTracker {
    pub delay: Duration,
    current: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: AtomicUsize,
}

impl ConcurrencyTracker {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Extractor for ConcurrencyTracker {
    async fn extract(
        &self,
        query: &SearchQuery,
        progress: ProgressReporter,
    ) -> Result<Vec<Lead>, ExtractionError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        progress.report(progress::SEARCH_LOADED);
        sleep(self.delay).await;

        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(sample_leads(query.limit, &query.niche))
    }
}

/// Records the city of every query in call order.
#[derive(Default)]
pub struct RecordingExtractor {
    pub cities: Mutex<Vec<String>>,
}

#[async_trait]
impl Extractor for RecordingExtractor {
    async fn extract(
        &self,
        query: &SearchQuery,
        _progress: ProgressReporter,
    ) -> Result<Vec<Lead>, ExtractionError> {
        self.cities.lock().unwrap().push(query.city.clone());
        Ok(Vec::new())
    }
}

/// Ignores the requested limit and returns more leads than asked for.
pub struct OverflowingExtractor(pub usize);

#[async_trait]
impl Extractor for OverflowingExtractor {
    async fn extract(
        &self,
        query: &SearchQuery,
        _progress: ProgressReporter,
    ) -> Result<Vec<Lead>, ExtractionError> {
        Ok(sample_leads(self.0, &query.niche))
    }
}

/// Panics mid-extraction.
pub struct PanickingExtractor;

#[async_trait]
impl Extractor for PanickingExtractor {
    async fn extract(
        &self,
        _query: &SearchQuery,
        progress: ProgressReporter,
    ) -> Result<Vec<Lead>, ExtractionError> {
        progress.report(progress::SEARCH_LOADED);
        panic!("selector blew up");
    }
}

/// Never finishes within any reasonable timeout.
pub struct HangingExtractor;

#[async_trait]
impl Extractor for HangingExtractor {
    async fn extract(
        &self,
        _query: &SearchQuery,
        _progress: ProgressReporter,
    ) -> Result<Vec<Lead>, ExtractionError> {
        sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

/// Fails for one city, succeeds for every other.
pub struct FlakyCityExtractor {
    pub failing_city: String,
}

#[async_trait]
impl Extractor for FlakyCityExtractor {
    async fn extract(
        &self,
        query: &SearchQuery,
        _progress: ProgressReporter,
    ) -> Result<Vec<Lead>, ExtractionError> {
        if query.city == self.failing_city {
            return Err(ExtractionError::LayoutChanged(
                "results list did not load".to_string(),
            ));
        }
        Ok(sample_leads(query.limit, &query.niche))
    }
}

/// Takes `per_record` for every record and stops at the job deadline.
pub struct SlowRecordExtractor {
    pub per_record: Duration,
}

#[async_trait]
impl Extractor for SlowRecordExtractor {
    async fn extract(
        &self,
        query: &SearchQuery,
        progress: ProgressReporter,
    ) -> Result<Vec<Lead>, ExtractionError> {
        progress.report(progress::CANDIDATES_FOUND);

        let mut leads = Vec::new();
        for (i, lead) in sample_leads(query.limit, &query.niche).into_iter().enumerate() {
            if query.deadline_passed() {
                break;
            }
            sleep(self.per_record).await;
            leads.push(lead);
            progress.record_processed(i + 1, query.limit);
        }

        Ok(leads)
    }
}

struct SetOnDrop<'a>(&'a AtomicBool);

impl Drop for SetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Hangs like a stuck browser session and notes when it is torn down.
#[derive(Default)]
pub struct SessionExtractor {
    pub started: AtomicBool,
    pub released: AtomicBool,
}

#[async_trait]
impl Extractor for SessionExtractor {
    async fn extract(
        &self,
        _query: &SearchQuery,
        _progress: ProgressReporter,
    ) -> Result<Vec<Lead>, ExtractionError> {
        let _session = SetOnDrop(&self.released);
        self.started.store(true, Ordering::SeqCst);
        sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

/// Archive kept in a map, for exercising the evicted-job path.
#[derive(Default)]
pub struct MemoryArchive {
    pub jobs: Mutex<HashMap<uuid::Uuid, ScrapeJob>>,
}

impl MemoryArchive {
    pub fn insert(&self, job: ScrapeJob) {
        self.jobs.lock().unwrap().insert(job.id, job);
    }

    pub fn contains(&self, id: uuid::Uuid) -> bool {
        self.jobs.lock().unwrap().contains_key(&id)
    }
}

#[async_trait]
impl JobArchive for MemoryArchive {
    async fn store(&self, job: &ScrapeJob, _ttl: Duration) -> Result<(), ArchiveError> {
        self.insert(job.clone());
        Ok(())
    }

    async fn load(&self, id: uuid::Uuid) -> Result<Option<ScrapeJob>, ArchiveError> {
        Ok(self.jobs.lock().unwrap().get(&id).cloned())
    }

    async fn health_check(&self) -> Result<(), ArchiveError> {
        Ok(())
    }
}

/// Poll until `check` holds, failing after `timeout`.
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !check() {
        assert!(Instant::now() < deadline, "condition not met within {timeout:?}");
        sleep(Duration::from_millis(5)).await;
    }
}

pub fn shared<E: Extractor + 'static>(extractor: E) -> Arc<E> {
    Arc::new(extractor)
}
