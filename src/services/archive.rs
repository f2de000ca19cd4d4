use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::models::job::ScrapeJob;

const KEY_PREFIX: &str = "lead_scrape:job";

fn job_key(id: Uuid) -> String {
    format!("{KEY_PREFIX}:{id}")
}

/// Long-lived copy of terminal job snapshots.
///
/// Lets a poller read a finished job after it has been evicted from the
/// in-memory registry.
#[async_trait]
pub trait JobArchive: Send + Sync {
    /// Store a snapshot that expires after `ttl`.
    async fn store(&self, job: &ScrapeJob, ttl: Duration) -> Result<(), ArchiveError>;

    /// Load an archived snapshot, if it has not expired.
    async fn load(&self, id: Uuid) -> Result<Option<ScrapeJob>, ArchiveError>;

    async fn health_check(&self) -> Result<(), ArchiveError>;
}

/// Snapshots kept in Redis under `lead_scrape:job:{id}` with a TTL.
pub struct RedisArchive {
    client: redis::Client,
}

impl RedisArchive {
    pub fn new(redis_url: &str) -> Result<Self, ArchiveError> {
        let client = redis::Client::open(redis_url).map_err(ArchiveError::Redis)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl JobArchive for RedisArchive {
    async fn store(&self, job: &ScrapeJob, ttl: Duration) -> Result<(), ArchiveError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(ArchiveError::Redis)?;
        let payload = serde_json::to_string(job).map_err(ArchiveError::Serialize)?;
        conn.set_ex::<_, _, ()>(job_key(job.id), payload, ttl.as_secs().max(1))
            .await
            .map_err(ArchiveError::Redis)?;
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<ScrapeJob>, ArchiveError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(ArchiveError::Redis)?;
        let payload: Option<String> = conn.get(job_key(id)).await.map_err(ArchiveError::Redis)?;

        match payload {
            Some(payload) => {
                let job = serde_json::from_str(&payload).map_err(ArchiveError::Serialize)?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// PING Redis (for health checks).
    async fn health_check(&self) -> Result<(), ArchiveError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(ArchiveError::Redis)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(ArchiveError::Redis)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
