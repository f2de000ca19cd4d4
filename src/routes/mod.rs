use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod auth;
pub mod error;
pub mod health;
pub mod metrics;
pub mod scrape;

/// API routes. Metrics and HTTP layers are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/scrape", post(scrape::submit_scrape))
        .route("/api/scrape/{job_id}", get(scrape::get_job_status))
        .with_state(state)
}
