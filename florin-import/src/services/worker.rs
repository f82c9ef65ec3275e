//! Import worker
//!
//! Drives one job through `queued → processing → done | error`. The loop
//! parses the decoded CSV, applies the dedup policy per candidate, issues
//! persistence instructions, and reports progress through the job store at a
//! bounded cadence. The worker never retries a failed job; the surrounding
//! queue re-runs it, and a re-run re-parses and re-applies dedup from
//! scratch without assuming prior partial state survived.

use base64::Engine;
use chrono::{NaiveDate, Utc};
use florin_common::jobs::{JobStats, JobStatus, JobUpdate, StatsPatch};
use florin_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db;
use crate::models::{PersistedTransaction, TransactionCandidate};
use crate::services::csv_parser::{parse_csv, ParsedRow};
use crate::services::dedup::{DedupDecision, DedupPolicy};
use crate::services::job_store::JobStore;

/// Report progress at least every this many records...
const PROGRESS_EVERY_ROWS: u64 = 25;
/// ...or whenever progress advanced by this many percentage points
const PROGRESS_EVERY_PERCENT: u8 = 5;

/// One queued import's inputs
#[derive(Debug, Clone)]
pub struct ImportPayload {
    pub job_id: Uuid,
    pub file_name: String,
    /// Base64-encoded CSV content
    pub csv_content: String,
    /// Similarity cutoff for the dedup policy, 0-100
    pub deduplicate_threshold: u8,
}

/// Executes import jobs against the transaction store
#[derive(Clone)]
pub struct ImportWorker {
    pool: SqlitePool,
    store: Arc<dyn JobStore>,
}

impl ImportWorker {
    pub fn new(pool: SqlitePool, store: Arc<dyn JobStore>) -> Self {
        Self { pool, store }
    }

    /// Run one job to its terminal state
    ///
    /// Returns the final stats on success. A store failure while marking the
    /// job as processing is fatal for this attempt and propagates so the
    /// queue's retry policy can take over.
    pub async fn run(&self, payload: &ImportPayload) -> Result<JobStats> {
        let job_id = payload.job_id;
        let started_at = Utc::now();
        let start = Instant::now();

        info!(job_id = %job_id, file = %payload.file_name, "Starting import job");

        self.store
            .set_status(
                job_id,
                JobUpdate {
                    status: Some(JobStatus::Processing),
                    started_at: Some(started_at),
                    stats: Some(StatsPatch::progress(0, 0)),
                    ..Default::default()
                },
            )
            .await?;

        let mut stats = JobStats::default();
        match self.process(payload, &mut stats, start).await {
            Ok(()) => {
                stats.progress = 100;
                stats.processing_time_ms = start.elapsed().as_millis() as u64;

                self.store
                    .set_status(
                        job_id,
                        JobUpdate {
                            status: Some(JobStatus::Done),
                            ended_at: Some(Utc::now()),
                            stats: Some(StatsPatch::snapshot(&stats)),
                            ..Default::default()
                        },
                    )
                    .await?;

                info!(
                    job_id = %job_id,
                    total = stats.total,
                    created = stats.created,
                    updated = stats.updated,
                    skipped = stats.skipped,
                    merged = stats.merged,
                    invalid = stats.invalid,
                    elapsed_ms = stats.processing_time_ms,
                    "Import job completed"
                );
                Ok(stats)
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Import job failed");
                stats.errors.push(e.to_string());
                stats.processing_time_ms = start.elapsed().as_millis() as u64;

                // Best-effort terminal write; partial progress already
                // written stays visible either way
                let terminal = self
                    .store
                    .set_status(
                        job_id,
                        JobUpdate {
                            status: Some(JobStatus::Error),
                            ended_at: Some(Utc::now()),
                            error: Some(e.to_string()),
                            stats: Some(StatsPatch::snapshot(&stats)),
                            ..Default::default()
                        },
                    )
                    .await;
                if let Err(store_err) = terminal {
                    error!(
                        job_id = %job_id,
                        error = %store_err,
                        "Failed to record error status"
                    );
                }
                Err(e)
            }
        }
    }

    /// Parse → classify → persist → progress-report loop
    async fn process(
        &self,
        payload: &ImportPayload,
        stats: &mut JobStats,
        start: Instant,
    ) -> Result<()> {
        let decoded = decode_csv_content(&payload.csv_content)?;
        let rows = parse_csv(&decoded)?;
        let total_rows = rows.len() as u64;
        let window = batch_date_window(&rows);

        let policy = DedupPolicy::new(payload.deduplicate_threshold);
        let mut accounts: HashMap<String, Uuid> = HashMap::new();
        let mut known: HashMap<Uuid, Vec<PersistedTransaction>> = HashMap::new();

        let mut last_reported_rows = 0u64;
        let mut last_reported_progress = 0u8;

        for row in &rows {
            match row {
                ParsedRow::Invalid { line, reason } => {
                    warn!(
                        job_id = %payload.job_id,
                        line,
                        reason = %reason,
                        "Skipping invalid row"
                    );
                    stats.invalid += 1;
                    stats.errors.push(format!("Row {}: {}", line, reason));
                }
                ParsedRow::Valid(candidate) => {
                    self.apply_candidate(candidate, &policy, window, &mut accounts, &mut known, stats)
                        .await?;
                }
            }
            stats.total += 1;

            // Progress stays below 100 until the terminal transition
            let progress = ((stats.total * 100 / total_rows) as u8).min(99);
            let due_by_rows = stats.total - last_reported_rows >= PROGRESS_EVERY_ROWS;
            let due_by_percent =
                progress.saturating_sub(last_reported_progress) >= PROGRESS_EVERY_PERCENT;
            if due_by_rows || due_by_percent {
                stats.progress = progress;
                stats.processing_time_ms = start.elapsed().as_millis() as u64;
                self.store
                    .set_status(
                        payload.job_id,
                        JobUpdate {
                            stats: Some(StatsPatch::snapshot(stats)),
                            ..Default::default()
                        },
                    )
                    .await?;
                last_reported_rows = stats.total;
                last_reported_progress = progress;
            }
        }

        Ok(())
    }

    /// Classify one candidate and issue the matching persistence instruction
    async fn apply_candidate(
        &self,
        candidate: &TransactionCandidate,
        policy: &DedupPolicy,
        window: Option<(NaiveDate, NaiveDate)>,
        accounts: &mut HashMap<String, Uuid>,
        known: &mut HashMap<Uuid, Vec<PersistedTransaction>>,
        stats: &mut JobStats,
    ) -> Result<()> {
        let account_id = match accounts.get(&candidate.account_name) {
            Some(id) => *id,
            None => {
                let id = db::accounts::get_or_create_account(&self.pool, &candidate.account_name)
                    .await?;
                accounts.insert(candidate.account_name.clone(), id);
                id
            }
        };

        if !known.contains_key(&account_id) {
            let existing = match window {
                Some((from, to)) => {
                    db::transactions::list_account_transactions(&self.pool, account_id, from, to)
                        .await?
                }
                None => Vec::new(),
            };
            known.insert(account_id, existing);
        }
        let existing = known
            .get_mut(&account_id)
            .ok_or_else(|| Error::Internal("Account snapshot missing".to_string()))?;

        match policy.classify(candidate, existing) {
            DedupDecision::Create => {
                let tx = PersistedTransaction::from_candidate(candidate, account_id);
                db::transactions::insert_transaction(&self.pool, &tx).await?;
                // Later candidates in this batch dedup against it
                existing.push(tx);
                stats.created += 1;
            }
            DedupDecision::Update(updated) => {
                db::transactions::update_transaction(&self.pool, &updated).await?;
                replace_snapshot(existing, updated);
                stats.updated += 1;
            }
            DedupDecision::Merge(merged) => {
                db::transactions::update_transaction(&self.pool, &merged).await?;
                replace_snapshot(existing, merged);
                stats.merged += 1;
            }
            DedupDecision::Skip => {
                stats.skipped += 1;
            }
        }

        Ok(())
    }
}

/// Swap the in-memory snapshot of an updated record so later candidates in
/// the same batch compare against the new contents (first writer wins the
/// update slot, process order = input row order)
fn replace_snapshot(existing: &mut [PersistedTransaction], updated: PersistedTransaction) {
    if let Some(slot) = existing.iter_mut().find(|tx| tx.id == updated.id) {
        *slot = updated;
    }
}

/// Decode the submitted base64 payload into CSV text
fn decode_csv_content(encoded: &str) -> Result<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::InvalidInput(format!("Failed to decode CSV content: {}", e)))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| Error::InvalidInput(format!("CSV content is not valid UTF-8: {}", e)))?;
    if text.trim().is_empty() {
        return Err(Error::InvalidInput("Decoded CSV content is empty".to_string()));
    }
    Ok(text)
}

/// The date span covered by this batch's valid rows; dedup only consults
/// existing records inside it
fn batch_date_window(rows: &[ParsedRow]) -> Option<(NaiveDate, NaiveDate)> {
    let mut window: Option<(NaiveDate, NaiveDate)> = None;
    for row in rows {
        if let ParsedRow::Valid(candidate) = row {
            window = Some(match window {
                Some((from, to)) => (from.min(candidate.date), to.max(candidate.date)),
                None => (candidate.date, candidate.date),
            });
        }
    }
    window
}
