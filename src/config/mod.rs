use serde::Deserialize;
use std::time::Duration;

use crate::services::maps::MapsExtractorConfig;
use crate::services::queue::RetentionPolicy;
use crate::services::worker::WorkerPoolConfig;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// HS256 secret used to verify caller tokens
    pub jwt_secret: String,

    /// Number of scrape jobs allowed to run at once
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Idle worker re-check interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Budget in seconds for a scrape job before any records
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// Seconds added to a job's budget per requested record
    #[serde(default = "default_record_timeout_secs")]
    pub record_timeout_secs: u64,

    /// Seconds an extraction may overrun its budget before it is aborted
    #[serde(default = "default_timeout_grace_secs")]
    pub timeout_grace_secs: u64,

    /// Maximum waiting jobs; unbounded when unset
    pub queue_capacity: Option<usize>,

    /// Seconds a finished job stays pollable
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Most finished jobs kept in memory
    #[serde(default = "default_max_retained_jobs")]
    pub max_retained_jobs: usize,

    /// Headless browser service base URL
    #[serde(default = "default_browser_url")]
    pub browser_url: String,

    /// Headless browser API token
    pub browser_token: Option<String>,

    /// Proxy handed to the headless browser
    pub proxy_server: Option<String>,

    /// Redis connection string for the job archive (optional)
    pub redis_url: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_worker_concurrency() -> usize {
    2
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_job_timeout_secs() -> u64 {
    90
}

fn default_record_timeout_secs() -> u64 {
    10
}

fn default_timeout_grace_secs() -> u64 {
    15
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_max_retained_jobs() -> usize {
    1000
}

fn default_browser_url() -> String {
    "http://localhost:3001".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn worker_pool(&self) -> WorkerPoolConfig {
        WorkerPoolConfig {
            concurrency: self.worker_concurrency.max(1),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(10)),
            job_timeout: Duration::from_secs(self.job_timeout_secs.max(1)),
            record_timeout: Duration::from_secs(self.record_timeout_secs),
            timeout_grace: Duration::from_secs(self.timeout_grace_secs),
            ..WorkerPoolConfig::default()
        }
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            ttl: Duration::from_secs(self.retention_secs),
            max_terminal: self.max_retained_jobs,
        }
    }

    pub fn maps_extractor(&self) -> MapsExtractorConfig {
        MapsExtractorConfig {
            browser_url: self.browser_url.clone(),
            browser_token: self.browser_token.clone(),
            proxy_server: self.proxy_server.clone(),
            ..MapsExtractorConfig::default()
        }
    }
}
