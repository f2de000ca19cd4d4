use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Highest value an extractor can report. 100 is reserved for completion.
pub const MAX_IN_FLIGHT: u8 = 99;

/// Headless browser is up and the search is being issued.
pub const BROWSER_READY: u8 = 10;

/// Search results page has loaded.
pub const SEARCH_LOADED: u8 = 30;

/// Candidate listings have been collected from the results feed.
pub const CANDIDATES_FOUND: u8 = 50;

/// Write handle for a running job's progress.
///
/// The worker keeps one clone inside the registry and hands another to the
/// extractor, so the extractor never touches the job itself. Reports only
/// ever move the value forward.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    value: Arc<AtomicU8>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a percentage. Lower values than the current one are ignored and
    /// anything above 99 is clamped.
    pub fn report(&self, percent: u8) {
        self.value
            .fetch_max(percent.min(MAX_IN_FLIGHT), Ordering::AcqRel);
    }

    /// Report per-record progress, spread linearly over the range between
    /// `CANDIDATES_FOUND` and completion.
    pub fn record_processed(&self, processed: usize, total: usize) {
        if total == 0 {
            return;
        }
        let span = (100 - CANDIDATES_FOUND) as usize;
        let step = processed.min(total) * span / total;
        self.report(CANDIDATES_FOUND.saturating_add(step as u8));
    }

    pub fn current(&self) -> u8 {
        self.value.load(Ordering::Acquire)
    }

    pub(crate) fn finish(&self) {
        self.value.store(100, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_zero() {
        assert_eq!(ProgressReporter::new().current(), 0);
    }

    #[test]
    fn test_reports_never_go_backwards() {
        let progress = ProgressReporter::new();
        progress.report(SEARCH_LOADED);
        progress.report(BROWSER_READY);
        assert_eq!(progress.current(), SEARCH_LOADED);
    }

    #[test]
    fn test_reports_are_clamped_below_completion() {
        let progress = ProgressReporter::new();
        progress.report(100);
        assert_eq!(progress.current(), MAX_IN_FLIGHT);
        progress.finish();
        assert_eq!(progress.current(), 100);
    }

    #[test]
    fn test_record_progress_is_linear() {
        let progress = ProgressReporter::new();
        progress.record_processed(1, 5);
        assert_eq!(progress.current(), 60);
        progress.record_processed(3, 5);
        assert_eq!(progress.current(), 80);
        progress.record_processed(5, 5);
        assert_eq!(progress.current(), MAX_IN_FLIGHT);
    }

    #[test]
    fn test_clones_share_the_same_cell() {
        let progress = ProgressReporter::new();
        let handle = progress.clone();
        handle.report(CANDIDATES_FOUND);
        assert_eq!(progress.current(), CANDIDATES_FOUND);
    }

    #[test]
    fn test_zero_total_is_ignored() {
        let progress = ProgressReporter::new();
        progress.record_processed(0, 0);
        assert_eq!(progress.current(), 0);
    }
}
