use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::lead::Lead;
use crate::models::scrape::ScrapeRequest;

/// Status of a scrape job in the background queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and failed jobs never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Coarse classification stored next to the human-readable error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    Unavailable,
    LayoutChanged,
    Timeout,
    Panicked,
    /// Still running when the service stopped.
    Shutdown,
}

/// A scrape job as seen by pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_id: Option<String>,
    pub request: ScrapeRequest,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<Lead>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScrapeJob {
    pub fn new(id: Uuid, caller_id: Option<String>, request: ScrapeRequest) -> Self {
        Self {
            id,
            caller_id,
            request,
            status: JobStatus::Waiting,
            progress: 0,
            result: None,
            error: None,
            error_kind: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}
