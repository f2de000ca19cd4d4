use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub queue: QueueHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<ComponentHealth>,
}

#[derive(Serialize)]
pub struct QueueHealth {
    pub status: String,
    pub workers: usize,
    pub waiting: usize,
    pub active: usize,
    pub retained: usize,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

/// GET /health: queue state plus archive connectivity when configured.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let queue_open = !state.queue.is_closed().await;
    let queue_check = QueueHealth {
        status: if queue_open { "ok" } else { "closed" }.to_string(),
        workers: state.workers,
        waiting: state.queue.queue_depth().await,
        active: state.queue.active_count().await,
        retained: state.queue.len().await,
    };

    let archive_check = match &state.archive {
        Some(archive) => {
            let start = std::time::Instant::now();
            Some(match archive.health_check().await {
                Ok(_) => ComponentHealth {
                    status: "ok".to_string(),
                    latency_ms: Some(start.elapsed().as_millis() as u64),
                },
                Err(_) => ComponentHealth {
                    status: "error".to_string(),
                    latency_ms: None,
                },
            })
        }
        None => None,
    };

    let all_healthy =
        queue_open && archive_check.as_ref().map_or(true, |check| check.status == "ok");
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            queue: queue_check,
            archive: archive_check,
        },
    };

    (status_code, Json(response))
}
