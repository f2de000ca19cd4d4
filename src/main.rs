use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use leadgen_scraper::{
    app_state::AppState,
    config::AppConfig,
    routes::{self, auth::TokenVerifier},
    services::{
        archive::{JobArchive, RedisArchive},
        extraction::Extractor,
        maps::MapsExtractor,
        queue::JobQueue,
        worker::WorkerPool,
    },
};
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// How long running jobs get to finish once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing leadgen-scraper");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe();

    // Optional Redis archive for finished jobs
    let archive: Option<Arc<dyn JobArchive>> = match &config.redis_url {
        Some(url) => {
            tracing::info!("Connecting to Redis job archive");
            let archive = RedisArchive::new(url).expect("Failed to initialize job archive");
            if let Err(e) = archive.health_check().await {
                tracing::warn!(error = %e, "Job archive not reachable yet");
            }
            let archive: Arc<dyn JobArchive> = Arc::new(archive);
            Some(archive)
        }
        None => None,
    };

    tracing::info!(browser_url = %config.browser_url, "Initializing map extractor");
    let extractor: Arc<dyn Extractor> = Arc::new(
        MapsExtractor::new(config.maps_extractor()).expect("Failed to initialize map extractor"),
    );

    let queue = Arc::new(JobQueue::new(config.queue_capacity, config.retention()));
    let pool = WorkerPool::spawn(
        queue.clone(),
        extractor,
        archive.clone(),
        config.worker_pool(),
    );

    let state = AppState::new(
        queue,
        archive,
        TokenVerifier::new(&config.jwt_secret),
        pool.size(),
    );

    let app = routes::router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    pool.shutdown(SHUTDOWN_GRACE).await;
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
