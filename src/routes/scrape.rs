use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::scrape::{JobStatusResponse, ScrapeRequest, SubmitResponse};
use crate::routes::auth::Caller;
use crate::routes::error::ApiError;
use crate::services::queue::QueueError;

/// POST /api/scrape: queue a background scrape and return its job id.
pub async fn submit_scrape(
    State(state): State<AppState>,
    Caller(caller_id): Caller,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidInput(e.body_text()))?;

    tracing::info!(
        caller = %caller_id,
        niche = %request.niche,
        city = %request.city,
        "Queueing scrape job"
    );

    let job_id = state.queue.submit(Some(caller_id), request).await?;

    Ok(Json(SubmitResponse {
        success: true,
        message: "Scraping started in background".to_string(),
        job_id,
    }))
}

/// GET /api/scrape/{job_id}: poll a scrape job.
pub async fn get_job_status(
    State(state): State<AppState>,
    _caller: Caller,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let id = Uuid::parse_str(&job_id).map_err(|_| ApiError::NotFound(job_id.clone()))?;

    match state.queue.get(id).await {
        Ok(job) => Ok(Json(job.into())),
        Err(QueueError::NotFound(id)) => {
            if let Some(archive) = &state.archive {
                match archive.load(id).await {
                    Ok(Some(job)) => return Ok(Json(job.into())),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(job_id = %id, error = %e, "Archive lookup failed"),
                }
            }
            Err(ApiError::NotFound(id.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}
