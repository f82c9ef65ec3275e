//! Deduplication / merge policy
//!
//! Given a candidate transaction and the already-known transactions for the
//! same account, decides whether the candidate is new, an exact duplicate, a
//! near-duplicate to merge, or an update to an existing record.
//!
//! Matching rules, in order:
//! 1. Date, amount, and type must match exactly before anything else is
//!    considered.
//! 2. Equal (or mutually containing) normalized descriptions are the natural
//!    key: `Skip` when nothing would change, `Update` when the candidate
//!    fills fields the existing record is missing.
//! 3. Otherwise, normalized Levenshtein similarity on the descriptions is
//!    compared against the configured threshold (0-100, default 60); at or
//!    above it the records are treated as the same real-world transaction
//!    and combined into one (`Merge`).

use crate::models::{PersistedTransaction, TransactionCandidate};
use chrono::Utc;

/// Default similarity cutoff (percent)
pub const DEFAULT_DEDUPLICATE_THRESHOLD: u8 = 60;

/// Outcome of comparing a candidate against known transactions
#[derive(Debug, Clone, PartialEq)]
pub enum DedupDecision {
    /// No match; insert the candidate as a new record
    Create,
    /// Natural-key match with changed fields; persist the updated record
    Update(PersistedTransaction),
    /// Fuzzy match above threshold; persist the combined record
    Merge(PersistedTransaction),
    /// Exact duplicate, nothing to change
    Skip,
}

/// Dedup policy with a configurable similarity threshold
#[derive(Debug, Clone, Copy)]
pub struct DedupPolicy {
    threshold: u8,
}

impl DedupPolicy {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold: threshold.min(100),
        }
    }

    /// Classify `candidate` against the existing records for its account.
    ///
    /// `existing` is scanned in order; the first record matching the natural
    /// key (or the similarity threshold) wins, so a batch of candidates that
    /// all match one record resolves in input order.
    pub fn classify(
        &self,
        candidate: &TransactionCandidate,
        existing: &[PersistedTransaction],
    ) -> DedupDecision {
        for record in existing {
            if record.date != candidate.date
                || record.amount != candidate.amount
                || record.tx_type != candidate.tx_type
            {
                continue;
            }

            if descriptions_equivalent(&record.description, &candidate.description) {
                return match updated_record(candidate, record) {
                    Some(updated) => DedupDecision::Update(updated),
                    None => DedupDecision::Skip,
                };
            }

            if self.similar(&record.description, &candidate.description) {
                return DedupDecision::Merge(merged_record(candidate, record));
            }
        }

        DedupDecision::Create
    }

    /// Normalized Levenshtein similarity (0-100) at or above the threshold
    fn similar(&self, a: &str, b: &str) -> bool {
        let a = normalize_description(a);
        let b = normalize_description(b);
        if a.is_empty() || b.is_empty() {
            return false;
        }
        let similarity = strsim::normalized_levenshtein(&a, &b) * 100.0;
        similarity >= self.threshold as f64
    }
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUPLICATE_THRESHOLD)
    }
}

/// Lowercase and strip to alphanumerics so punctuation and spacing
/// differences between bank exports do not defeat matching
fn normalize_description(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Exact match, or one normalized description contains the other
/// (shortened/extended merchant names)
fn descriptions_equivalent(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let a = normalize_description(a);
    let b = normalize_description(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

/// Fill empty fields on the existing record from the candidate; `None` when
/// nothing would change
fn updated_record(
    candidate: &TransactionCandidate,
    existing: &PersistedTransaction,
) -> Option<PersistedTransaction> {
    let mut updated = existing.clone();
    let mut changed = false;

    if existing.category.as_deref().unwrap_or("").is_empty() {
        if let Some(category) = &candidate.category {
            updated.category = Some(category.clone());
            changed = true;
        }
    }

    if changed {
        updated.updated_at = Utc::now();
        Some(updated)
    } else {
        None
    }
}

/// Combine a fuzzy-matched pair into one record: keep the existing identity,
/// prefer the longer description, fill missing category
fn merged_record(
    candidate: &TransactionCandidate,
    existing: &PersistedTransaction,
) -> PersistedTransaction {
    let mut merged = existing.clone();
    if candidate.description.len() > existing.description.len() {
        merged.description = candidate.description.clone();
    }
    if merged.category.as_deref().unwrap_or("").is_empty() {
        merged.category = candidate.category.clone();
    }
    merged.updated_at = Utc::now();
    merged
}
