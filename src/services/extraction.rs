//! Contract between the worker pool and whatever actually gathers leads.
//!
//! An [`Extractor`] receives a [`SearchQuery`] and a [`ProgressReporter`] and
//! returns the records it found. It must tell apart "could not search at
//! all" (an [`ExtractionError`]) from "searched and found fewer than asked"
//! (`Ok` with a short list). Problems with individual records are the
//! extractor's to absorb; the worker additionally drops any record that
//! fails validation.

use std::time::Duration;

use async_trait::async_trait;
use garde::Validate;
use tokio::time::Instant;

use crate::models::job::FailureKind;
use crate::models::lead::Lead;
use crate::models::scrape::ScrapeRequest;
use crate::services::progress::ProgressReporter;

/// What to search for, derived from an accepted scrape request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub niche: String,
    pub city: String,
    pub country: Option<String>,
    pub limit: usize,
    /// Once this passes, stop gathering records and return what was found.
    pub deadline: Option<Instant>,
}

impl SearchQuery {
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Time left before the deadline. `None` when there is no deadline.
    pub fn time_left(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn deadline_passed(&self) -> bool {
        self.time_left().is_some_and(|left| left.is_zero())
    }

    /// `bound`, shortened to whatever is left before the deadline.
    pub fn bounded(&self, bound: Duration) -> Duration {
        self.time_left().map_or(bound, |left| left.min(bound))
    }

    /// Free-text search phrase, e.g. `dentist in Springfield, US`.
    pub fn search_text(&self) -> String {
        match &self.country {
            Some(country) => format!("{} in {}, {}", self.niche, self.city, country),
            None => format!("{} in {}", self.niche, self.city),
        }
    }
}

impl From<&ScrapeRequest> for SearchQuery {
    fn from(req: &ScrapeRequest) -> Self {
        Self {
            niche: req.niche.clone(),
            city: req.city.clone(),
            country: req.country.clone(),
            limit: req.limit,
            deadline: None,
        }
    }
}

/// The whole search could not be carried out.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("search target unavailable: {0}")]
    Unavailable(String),

    #[error("search page layout changed: {0}")]
    LayoutChanged(String),

    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    #[error("HTTP request to headless browser failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ExtractionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractionError::Unavailable(_) | ExtractionError::Http(_) => FailureKind::Unavailable,
            ExtractionError::LayoutChanged(_) => FailureKind::LayoutChanged,
            ExtractionError::Timeout { .. } => FailureKind::Timeout,
        }
    }
}

/// A single candidate record could not be extracted. Logged and skipped.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("record page failed to load: {0}")]
    Load(String),

    #[error("record is missing {0}")]
    Missing(&'static str),

    #[error("record failed validation: {0}")]
    Invalid(String),
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        query: &SearchQuery,
        progress: ProgressReporter,
    ) -> Result<Vec<Lead>, ExtractionError>;
}

/// Drop records that fail validation and cap the list at `limit`.
///
/// Returns the kept records and how many were skipped as malformed.
pub fn sanitize_records(records: Vec<Lead>, limit: usize) -> (Vec<Lead>, usize) {
    let mut kept = Vec::with_capacity(records.len().min(limit));
    let mut skipped = 0;

    for lead in records {
        if kept.len() >= limit {
            break;
        }
        match lead.validate() {
            Ok(()) => kept.push(lead),
            Err(report) => {
                let err = RecordError::Invalid(report.to_string());
                tracing::warn!(error = %err, "Skipping malformed record");
                skipped += 1;
            }
        }
    }

    (kept, skipped)
}
