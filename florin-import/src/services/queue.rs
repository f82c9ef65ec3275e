//! In-process job queue
//!
//! Accepted imports are handed to a dispatcher task over an unbounded
//! channel. Each job runs in its own spawned task so a long import never
//! blocks later submissions. Failed attempts are retried with exponential
//! backoff; the worker's own dedup pass makes a re-run safe.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use florin_common::{Error, Result};

use crate::services::worker::{ImportPayload, ImportWorker};

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(1000);

/// Submission handle to the dispatcher task
#[derive(Clone)]
pub struct ImportQueue {
    tx: mpsc::UnboundedSender<ImportPayload>,
}

impl ImportQueue {
    /// Spawn the dispatcher and return its submission handle
    pub fn start(worker: ImportWorker) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<ImportPayload>();
        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                let worker = worker.clone();
                tokio::spawn(async move {
                    run_with_retry(worker, payload).await;
                });
            }
            info!("Import queue dispatcher stopped");
        });
        Self { tx }
    }

    /// Hand a job to the dispatcher
    pub fn enqueue(&self, payload: ImportPayload) -> Result<()> {
        self.tx
            .send(payload)
            .map_err(|_| Error::Internal("Import queue is shut down".to_string()))
    }
}

/// Delay before retry `attempt` (1-based): 1s, 2s, 4s, ...
fn backoff_delay(attempt: u32) -> Duration {
    BACKOFF_BASE * 2u32.saturating_pow(attempt.saturating_sub(1))
}

async fn run_with_retry(worker: ImportWorker, payload: ImportPayload) {
    for attempt in 1..=MAX_ATTEMPTS {
        match worker.run(&payload).await {
            Ok(_) => return,
            Err(e) if attempt < MAX_ATTEMPTS => {
                let delay = backoff_delay(attempt);
                warn!(
                    job_id = %payload.job_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Import attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(
                    job_id = %payload.job_id,
                    attempts = MAX_ATTEMPTS,
                    error = %e,
                    "Import job exhausted retries"
                );
            }
        }
    }
}
