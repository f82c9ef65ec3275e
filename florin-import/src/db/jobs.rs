//! Import job record persistence
//!
//! Job records are stored as JSON snapshots with an `expires_at` column
//! standing in for key expiry: reads filter on it, writes purge expired rows.
//! A job record therefore disappears a fixed retention window after its last
//! write, regardless of terminal state.

use chrono::{Duration, Utc};
use florin_common::jobs::{ImportJob, JobStatus};
use florin_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Write a job snapshot with a fresh expiry
pub async fn upsert_job(pool: &SqlitePool, job: &ImportJob, ttl_seconds: u64) -> Result<()> {
    let record = serde_json::to_string(job)
        .map_err(|e| Error::Internal(format!("Failed to serialize job: {}", e)))?;
    let status = serde_json::to_string(&job.status)
        .map_err(|e| Error::Internal(format!("Failed to serialize status: {}", e)))?;
    let expires_at = (Utc::now() + Duration::seconds(ttl_seconds as i64)).to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO import_jobs (job_id, status, file_name, record, expires_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(job_id) DO UPDATE SET
            status = excluded.status,
            record = excluded.record,
            expires_at = excluded.expires_at
        "#,
    )
    .bind(job.job_id.to_string())
    .bind(&status)
    .bind(&job.file_name)
    .bind(&record)
    .bind(&expires_at)
    .execute(pool)
    .await?;

    purge_expired(pool).await?;
    Ok(())
}

/// Load a job snapshot; expired records read as absent
pub async fn load_job(pool: &SqlitePool, job_id: Uuid) -> Result<Option<ImportJob>> {
    let row = sqlx::query(
        "SELECT record FROM import_jobs WHERE job_id = ? AND expires_at > ?",
    )
    .bind(job_id.to_string())
    .bind(Utc::now().to_rfc3339())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let record: String = row.get("record");
            let job = serde_json::from_str(&record)
                .map_err(|e| Error::Internal(format!("Failed to deserialize job: {}", e)))?;
            Ok(Some(job))
        }
        None => Ok(None),
    }
}

/// List non-terminal, non-expired jobs
pub async fn list_active_jobs(pool: &SqlitePool) -> Result<Vec<ImportJob>> {
    let queued = serde_json::to_string(&JobStatus::Queued)
        .map_err(|e| Error::Internal(format!("Failed to serialize status: {}", e)))?;
    let processing = serde_json::to_string(&JobStatus::Processing)
        .map_err(|e| Error::Internal(format!("Failed to serialize status: {}", e)))?;

    let rows = sqlx::query(
        "SELECT record FROM import_jobs WHERE status IN (?, ?) AND expires_at > ?",
    )
    .bind(&queued)
    .bind(&processing)
    .bind(Utc::now().to_rfc3339())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let record: String = row.get("record");
            serde_json::from_str(&record)
                .map_err(|e| Error::Internal(format!("Failed to deserialize job: {}", e)))
        })
        .collect()
}

/// Delete rows past their expiry
async fn purge_expired(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM import_jobs WHERE expires_at <= ?")
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn round_trips_job_record() {
        let pool = test_pool().await;
        let job = ImportJob::queued(Uuid::new_v4(), "tx.csv".to_string());
        upsert_job(&pool, &job, 3600).await.unwrap();

        let loaded = load_job(&pool, job.job_id).await.unwrap().unwrap();
        assert_eq!(loaded.job_id, job.job_id);
        assert_eq!(loaded.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn expired_record_reads_as_absent() {
        let pool = test_pool().await;
        let job = ImportJob::queued(Uuid::new_v4(), "tx.csv".to_string());
        upsert_job(&pool, &job, 0).await.unwrap();

        // TTL of zero expires immediately
        let loaded = load_job(&pool, job.job_id).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn active_listing_excludes_terminal_jobs() {
        let pool = test_pool().await;
        let active = ImportJob::queued(Uuid::new_v4(), "a.csv".to_string());
        let mut done = ImportJob::queued(Uuid::new_v4(), "b.csv".to_string());
        done.status = JobStatus::Done;

        upsert_job(&pool, &active, 3600).await.unwrap();
        upsert_job(&pool, &done, 3600).await.unwrap();

        let listed = list_active_jobs(&pool).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].job_id, active.job_id);
    }
}
