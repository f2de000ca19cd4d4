use std::sync::Arc;

use crate::routes::auth::TokenVerifier;
use crate::services::{archive::JobArchive, queue::JobQueue};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<JobQueue>,
    pub archive: Option<Arc<dyn JobArchive>>,
    pub auth: Arc<TokenVerifier>,
    /// Size of the worker pool serving `queue`
    pub workers: usize,
}

impl AppState {
    pub fn new(
        queue: Arc<JobQueue>,
        archive: Option<Arc<dyn JobArchive>>,
        auth: TokenVerifier,
        workers: usize,
    ) -> Self {
        Self {
            queue,
            archive,
            auth: Arc::new(auth),
            workers,
        }
    }
}
