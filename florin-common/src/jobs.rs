//! Import job model
//!
//! One `ImportJob` record tracks a single asynchronous CSV import from
//! submission to its terminal state. The record is owned by the worker that
//! created it and read by the status API and the progress relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Import job lifecycle state
///
/// `Queued → Processing → Done` or `Queued → Processing → Error`.
/// No transitions out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Error,
}

impl JobStatus {
    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

/// Per-job counters
///
/// Invariant at completion: `created + updated + skipped + merged + invalid == total`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub merged: u64,
    pub invalid: u64,
    pub total: u64,
    /// Percentage complete, 0-100
    pub progress: u8,
    /// Wall-clock processing time in milliseconds
    pub processing_time_ms: u64,
    /// Per-row error strings accumulated during processing
    pub errors: Vec<String>,
}

impl JobStats {
    /// Rows that have been classified so far
    pub fn classified(&self) -> u64 {
        self.created + self.updated + self.skipped + self.merged + self.invalid
    }
}

/// One CSV import attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub job_id: Uuid,
    pub file_name: String,
    pub status: JobStatus,
    pub stats: JobStats,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportJob {
    /// Create a freshly queued job record
    pub fn queued(job_id: Uuid, file_name: String) -> Self {
        Self {
            job_id,
            file_name,
            status: JobStatus::Queued,
            stats: JobStats::default(),
            started_at: None,
            ended_at: None,
            error: None,
        }
    }
}

/// Partial update merged into an existing job record by the job store
///
/// Fields left `None` keep their current value. Stats are merged field-wise
/// rather than replaced wholesale, so a progress-only update does not clobber
/// previously written counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub stats: Option<StatsPatch>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// True when the update carries a progress value and should be published
    /// on the progress channel after the write
    pub fn has_progress(&self) -> bool {
        self.stats
            .as_ref()
            .map(|s| s.progress.is_some())
            .unwrap_or(false)
    }

    /// Merge this update into `job`, returning the merged record
    pub fn apply(self, mut job: ImportJob) -> ImportJob {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(started_at) = self.started_at {
            job.started_at = Some(started_at);
        }
        if let Some(ended_at) = self.ended_at {
            job.ended_at = Some(ended_at);
        }
        if let Some(error) = self.error {
            job.error = Some(error);
        }
        if let Some(patch) = self.stats {
            patch.apply(&mut job.stats);
        }
        job
    }
}

/// Field-wise patch over `JobStats`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsPatch {
    pub created: Option<u64>,
    pub updated: Option<u64>,
    pub skipped: Option<u64>,
    pub merged: Option<u64>,
    pub invalid: Option<u64>,
    pub total: Option<u64>,
    pub progress: Option<u8>,
    pub processing_time_ms: Option<u64>,
    pub errors: Option<Vec<String>>,
}

impl StatsPatch {
    /// Patch carrying only a progress value and elapsed time
    pub fn progress(progress: u8, processing_time_ms: u64) -> Self {
        Self {
            progress: Some(progress),
            processing_time_ms: Some(processing_time_ms),
            ..Default::default()
        }
    }

    /// Full snapshot of a stats record
    pub fn snapshot(stats: &JobStats) -> Self {
        Self {
            created: Some(stats.created),
            updated: Some(stats.updated),
            skipped: Some(stats.skipped),
            merged: Some(stats.merged),
            invalid: Some(stats.invalid),
            total: Some(stats.total),
            progress: Some(stats.progress),
            processing_time_ms: Some(stats.processing_time_ms),
            errors: Some(stats.errors.clone()),
        }
    }

    fn apply(self, stats: &mut JobStats) {
        if let Some(v) = self.created {
            stats.created = v;
        }
        if let Some(v) = self.updated {
            stats.updated = v;
        }
        if let Some(v) = self.skipped {
            stats.skipped = v;
        }
        if let Some(v) = self.merged {
            stats.merged = v;
        }
        if let Some(v) = self.invalid {
            stats.invalid = v;
        }
        if let Some(v) = self.total {
            stats.total = v;
        }
        if let Some(v) = self.progress {
            stats.progress = v;
        }
        if let Some(v) = self.processing_time_ms {
            stats.processing_time_ms = v;
        }
        if let Some(v) = self.errors {
            stats.errors = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_only_update_keeps_counters() {
        let mut job = ImportJob::queued(Uuid::new_v4(), "tx.csv".to_string());
        job.stats.created = 7;
        job.stats.total = 10;

        let update = JobUpdate {
            stats: Some(StatsPatch::progress(70, 1200)),
            ..Default::default()
        };
        let merged = update.apply(job);

        assert_eq!(merged.stats.created, 7);
        assert_eq!(merged.stats.total, 10);
        assert_eq!(merged.stats.progress, 70);
        assert_eq!(merged.stats.processing_time_ms, 1200);
    }

    #[test]
    fn status_update_preserves_other_fields() {
        let id = Uuid::new_v4();
        let job = ImportJob::queued(id, "tx.csv".to_string());
        let merged = JobUpdate::status(JobStatus::Processing).apply(job);

        assert_eq!(merged.job_id, id);
        assert_eq!(merged.file_name, "tx.csv");
        assert_eq!(merged.status, JobStatus::Processing);
        assert!(merged.error.is_none());
    }

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn wire_casing_is_camel_case() {
        let job = ImportJob::queued(Uuid::new_v4(), "tx.csv".to_string());
        let json = serde_json::to_value(&job).unwrap();
        assert!(json.get("jobId").is_some());
        assert!(json.get("fileName").is_some());
        assert_eq!(json["status"], "queued");
        assert!(json["stats"].get("processingTimeMs").is_some());
    }
}
