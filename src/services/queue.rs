//! Redis-backed FIFO job queue.
//!
//! Queue entries are job IDs; the metadata record lives in the status
//! store's hash and is written atomically with the queue entry at
//! enqueue time, so a refused enqueue leaves no orphaned record.
//!
//! Claiming moves an ID from the queue list to the processing list
//! with `BRPOPLPUSH`, which both serializes claims (no two workers
//! ever pop the same entry) and wakes blocked workers promptly when
//! work arrives. Each claim takes a lease key with a TTL slightly
//! beyond the engine timeout; a processing entry whose lease has
//! expired belonged to a dead worker and is eligible for requeue.

use redis::AsyncCommands;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::models::job::Job;
use crate::services::store::{self, FAILED_COUNT_KEY, SUCCEEDED_COUNT_KEY};

const QUEUE_KEY: &str = "phone_validate:jobs";
const PROCESSING_KEY: &str = "phone_validate:processing";
const LEASE_KEY_PREFIX: &str = "phone_validate:lease:";

fn lease_key(id: Uuid) -> String {
    format!("{LEASE_KEY_PREFIX}{id}")
}

/// Bucket counts across the job population.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueDepth {
    pub queued: u64,
    pub running: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Redis-backed multi-producer/multi-consumer job queue.
pub struct JobQueue {
    client: redis::Client,
}

impl JobQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client })
    }

    /// Enqueue a job: write its metadata hash and push its ID onto the
    /// queue in one MULTI/EXEC transaction. If Redis refuses, the
    /// caller gets an error and no job record exists anywhere.
    pub async fn enqueue(&self, job: &Job) -> Result<(), QueueError> {
        let mut conn = self.connect().await?;
        let fields = store::encode_job(job).map_err(|e| QueueError::Encode(e.to_string()))?;
        redis::pipe()
            .atomic()
            .hset_multiple(store::job_key(job.id), &fields)
            .lpush(QUEUE_KEY, job.id.to_string())
            .query_async::<()>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Claim the next job, blocking up to `block` when the queue is
    /// empty. The claimed ID moves to the processing list and a lease
    /// with `lease_ttl` is taken on it. Returns `None` on timeout.
    ///
    /// The pop and the lease write are two commands; a worker dying in
    /// between leaves a leaseless processing entry, which the reaper
    /// path treats exactly like any other expired lease.
    pub async fn claim(
        &self,
        block: Duration,
        lease_ttl: Duration,
    ) -> Result<Option<Uuid>, QueueError> {
        let mut conn = self.connect().await?;
        let entry: Option<String> = conn
            .brpoplpush(QUEUE_KEY, PROCESSING_KEY, block.as_secs_f64())
            .await
            .map_err(QueueError::Redis)?;
        let Some(entry) = entry else {
            return Ok(None);
        };
        let id = Uuid::parse_str(&entry).map_err(|_| QueueError::BadEntry(entry))?;
        conn.set_ex::<_, _, ()>(lease_key(id), 1u8, lease_ttl.as_secs())
            .await
            .map_err(QueueError::Redis)?;
        Ok(Some(id))
    }

    /// Drop a finished job from the processing list and release its
    /// lease. Call after the terminal state is recorded.
    pub async fn complete(&self, id: Uuid) -> Result<(), QueueError> {
        let mut conn = self.connect().await?;
        redis::pipe()
            .lrem(PROCESSING_KEY, 1, id.to_string())
            .del(lease_key(id))
            .query_async::<()>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// 1-based place in line among queued jobs: 1 means next to be
    /// claimed. `None` when the job is not queued (running, terminal
    /// or unknown).
    pub async fn position(&self, id: Uuid) -> Result<Option<u64>, QueueError> {
        let mut conn = self.connect().await?;
        let entries: Vec<String> = conn
            .lrange(QUEUE_KEY, 0, -1)
            .await
            .map_err(QueueError::Redis)?;
        let wanted = id.to_string();
        // LPUSH adds at the head and claims pop from the tail, so rank
        // counts from the tail end of the list.
        Ok(entries
            .iter()
            .position(|entry| *entry == wanted)
            .map(|idx| (entries.len() - idx) as u64))
    }

    /// Bucket counts: list lengths for the live buckets, terminal
    /// counters maintained by the status store for the rest.
    pub async fn depth(&self) -> Result<QueueDepth, QueueError> {
        let mut conn = self.connect().await?;
        let queued: u64 = conn.llen(QUEUE_KEY).await.map_err(QueueError::Redis)?;
        let running: u64 = conn.llen(PROCESSING_KEY).await.map_err(QueueError::Redis)?;
        let succeeded: Option<u64> = conn
            .get(SUCCEEDED_COUNT_KEY)
            .await
            .map_err(QueueError::Redis)?;
        let failed: Option<u64> = conn.get(FAILED_COUNT_KEY).await.map_err(QueueError::Redis)?;
        Ok(QueueDepth {
            queued,
            running,
            succeeded: succeeded.unwrap_or(0),
            failed: failed.unwrap_or(0),
        })
    }

    /// IDs currently on the processing list, for the reaper pass.
    pub async fn processing_ids(&self) -> Result<Vec<Uuid>, QueueError> {
        let mut conn = self.connect().await?;
        let entries: Vec<String> = conn
            .lrange(PROCESSING_KEY, 0, -1)
            .await
            .map_err(QueueError::Redis)?;
        entries
            .into_iter()
            .map(|entry| Uuid::parse_str(&entry).map_err(|_| QueueError::BadEntry(entry)))
            .collect()
    }

    /// Whether the claim lease for a job is still alive.
    pub async fn lease_alive(&self, id: Uuid) -> Result<bool, QueueError> {
        let mut conn = self.connect().await?;
        let alive: bool = conn.exists(lease_key(id)).await.map_err(QueueError::Redis)?;
        Ok(alive)
    }

    /// Move an abandoned job from the processing list back to the
    /// front of the queue, so it is the next claim.
    pub async fn requeue_front(&self, id: Uuid) -> Result<(), QueueError> {
        let mut conn = self.connect().await?;
        let entry = id.to_string();
        redis::pipe()
            .atomic()
            .lrem(PROCESSING_KEY, 1, &entry)
            .rpush(QUEUE_KEY, &entry)
            .del(lease_key(id))
            .query_async::<()>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Remove a processing entry without requeueing it, for jobs whose
    /// record is already terminal or has expired.
    pub async fn drop_processing(&self, id: Uuid) -> Result<(), QueueError> {
        self.complete(id).await
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.connect().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    async fn connect(&self) -> Result<redis::aio::MultiplexedConnection, QueueError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to encode job record: {0}")]
    Encode(String),

    #[error("queue entry is not a job id: {0}")]
    BadEntry(String),
}
