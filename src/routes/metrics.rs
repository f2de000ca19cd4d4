use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Prometheus metrics scrape endpoint.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Register descriptions for the metrics emitted by the queue and workers.
pub fn describe() {
    metrics::describe_counter!("scrape_jobs_submitted_total", "Total scrape jobs accepted");
    metrics::describe_counter!("scrape_jobs_completed_total", "Total scrape jobs completed");
    metrics::describe_counter!(
        "scrape_jobs_failed_total",
        "Total scrape jobs that failed, by failure kind"
    );
    metrics::describe_counter!(
        "scrape_records_skipped_total",
        "Listings skipped because they could not be extracted"
    );
    metrics::describe_counter!(
        "scrape_jobs_evicted_total",
        "Finished jobs dropped by the retention policy"
    );
    metrics::describe_gauge!("scrape_jobs_active", "Scrape jobs currently running");
    metrics::describe_gauge!("scrape_queue_depth", "Scrape jobs waiting for a worker");
    metrics::describe_histogram!(
        "scrape_job_duration_seconds",
        "Time from pick-up to terminal state for a scrape job"
    );
}
