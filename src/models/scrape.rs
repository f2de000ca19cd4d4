use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::{FailureKind, JobStatus, ScrapeJob};
use crate::models::lead::Lead;

/// Results requested when the caller does not say.
pub const DEFAULT_LIMIT: usize = 5;

/// Upper bound on results per job; each result costs one page load.
pub const MAX_LIMIT: usize = 50;

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// Request to scrape business listings for a niche in a city.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ScrapeRequest {
    #[garde(length(min = 1, max = 200))]
    #[serde(default)]
    pub niche: String,

    #[garde(length(min = 1, max = 200))]
    #[serde(default)]
    pub city: String,

    #[garde(length(min = 1, max = 100))]
    #[serde(default)]
    pub country: Option<String>,

    #[garde(range(min = 1, max = MAX_LIMIT))]
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl ScrapeRequest {
    /// Trim surrounding whitespace and drop a blank country so validation
    /// sees what the extractor would see.
    pub fn normalized(self) -> Self {
        let country = self
            .country
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Self {
            niche: self.niche.trim().to_string(),
            city: self.city.trim().to_string(),
            country,
            limit: self.limit,
        }
    }
}

/// Response after queueing a scrape job.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub job_id: Uuid,
}

/// Response for polling a scrape job.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub id: Uuid,
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

impl From<ScrapeJob> for JobStatusResponse {
    fn from(job: ScrapeJob) -> Self {
        Self {
            id: job.id,
            status: job.status,
            progress: job.progress,
            result: job.result,
            error: job.error,
            error_kind: job.error_kind,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: serde_json::Value) -> ScrapeRequest {
        serde_json::from_value::<ScrapeRequest>(value).unwrap().normalized()
    }

    #[test]
    fn test_limit_defaults_to_five() {
        let req = parse(serde_json::json!({"niche": "dentist", "city": "Springfield"}));
        assert_eq!(req.limit, DEFAULT_LIMIT);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_missing_city_fails_validation() {
        let req = parse(serde_json::json!({"niche": "dentist"}));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_blank_niche_fails_validation() {
        let req = parse(serde_json::json!({"niche": "   ", "city": "Springfield"}));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_blank_country_is_dropped() {
        let req = parse(serde_json::json!({
            "niche": " dentist ",
            "city": "Springfield",
            "country": "  "
        }));
        assert_eq!(req.niche, "dentist");
        assert_eq!(req.country, None);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_limit_out_of_range_fails_validation() {
        let zero = parse(serde_json::json!({"niche": "dentist", "city": "Springfield", "limit": 0}));
        assert!(zero.validate().is_err());

        let huge = parse(serde_json::json!({
            "niche": "dentist",
            "city": "Springfield",
            "limit": MAX_LIMIT + 1
        }));
        assert!(huge.validate().is_err());
    }
}
