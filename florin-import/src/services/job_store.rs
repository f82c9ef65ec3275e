//! Job status store
//!
//! Durable-but-ephemeral record of one job's lifecycle, visible to any
//! process that knows the job id. Writes merge a partial update into the
//! existing record (creating one if absent), refresh the retention window,
//! and — when the update carries a progress value — broadcast the merged
//! record on the progress channel. Publish happens after the write;
//! delivery is at-least-once with no ordering guarantee beyond that.
//!
//! The store is injected behind a trait so tests substitute `MemoryJobStore`
//! for the SQLite-backed production implementation.

use async_trait::async_trait;
use florin_common::events::{EventBus, ImportEvent};
use florin_common::jobs::{ImportJob, JobUpdate};
use florin_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Job status store interface
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a freshly queued job record
    async fn insert(&self, job: &ImportJob) -> Result<()>;

    /// Merge `update` into the job record and write it back with a fresh
    /// expiry. Returns the merged record. Fails loudly when the underlying
    /// store is unreachable; callers must not drop progress silently.
    async fn set_status(&self, job_id: Uuid, update: JobUpdate) -> Result<ImportJob>;

    /// Current record, or `None` for unknown/expired jobs
    async fn get_status(&self, job_id: Uuid) -> Result<Option<ImportJob>>;

    /// Non-terminal jobs still within their retention window
    async fn list_active(&self) -> Result<Vec<ImportJob>>;
}

/// SQLite-backed production store
pub struct SqliteJobStore {
    pool: SqlitePool,
    bus: EventBus,
    ttl_seconds: u64,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool, bus: EventBus, ttl_seconds: u64) -> Self {
        Self {
            pool,
            bus,
            ttl_seconds,
        }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, job: &ImportJob) -> Result<()> {
        crate::db::jobs::upsert_job(&self.pool, job, self.ttl_seconds).await
    }

    async fn set_status(&self, job_id: Uuid, update: JobUpdate) -> Result<ImportJob> {
        let current = crate::db::jobs::load_job(&self.pool, job_id)
            .await?
            .unwrap_or_else(|| ImportJob::queued(job_id, String::new()));

        let publish = update.has_progress();
        let merged = update.apply(current);
        crate::db::jobs::upsert_job(&self.pool, &merged, self.ttl_seconds).await?;

        if publish {
            self.bus.emit(ImportEvent::JobUpdated {
                job: merged.clone(),
            });
        }

        Ok(merged)
    }

    async fn get_status(&self, job_id: Uuid) -> Result<Option<ImportJob>> {
        crate::db::jobs::load_job(&self.pool, job_id).await
    }

    async fn list_active(&self) -> Result<Vec<ImportJob>> {
        crate::db::jobs::list_active_jobs(&self.pool).await
    }
}

/// In-memory store for tests
///
/// Retention is modeled but not timed out mid-test; `fail_writes` simulates
/// an unreachable store for the dependency-error path.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<RwLock<HashMap<Uuid, ImportJob>>>,
    bus: Option<EventBus>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bus(bus: EventBus) -> Self {
        Self {
            bus: Some(bus),
            ..Self::default()
        }
    }

    /// Make subsequent writes fail, simulating an unreachable store
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Internal("Job store unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &ImportJob) -> Result<()> {
        self.check_reachable()?;
        self.jobs.write().await.insert(job.job_id, job.clone());
        Ok(())
    }

    async fn set_status(&self, job_id: Uuid, update: JobUpdate) -> Result<ImportJob> {
        self.check_reachable()?;
        let mut jobs = self.jobs.write().await;
        let current = jobs
            .get(&job_id)
            .cloned()
            .unwrap_or_else(|| ImportJob::queued(job_id, String::new()));

        let publish = update.has_progress();
        let merged = update.apply(current);
        jobs.insert(job_id, merged.clone());
        drop(jobs);

        if publish {
            if let Some(bus) = &self.bus {
                bus.emit(ImportEvent::JobUpdated {
                    job: merged.clone(),
                });
            }
        }

        Ok(merged)
    }

    async fn get_status(&self, job_id: Uuid) -> Result<Option<ImportJob>> {
        Ok(self.jobs.read().await.get(&job_id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<ImportJob>> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| !job.status.is_terminal())
            .cloned()
            .collect())
    }
}
