//! Transaction types
//!
//! A `TransactionCandidate` is a row parsed from CSV; it exists only during
//! one worker pass. A `PersistedTransaction` is the durable record after
//! dedup resolution.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical transaction type vocabulary
///
/// Each source format translates its native vocabulary into this set during
/// parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
    Transfer,
}

impl TransactionType {
    /// Parse from a source-format type string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" | "credit" | "deposit" => Some(TransactionType::Income),
            "expense" | "debit" | "purchase" | "regular" => Some(TransactionType::Expense),
            "transfer" | "internal transfer" => Some(TransactionType::Transfer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
            TransactionType::Transfer => "transfer",
        }
    }
}

/// A row parsed from CSV before persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCandidate {
    pub date: NaiveDate,
    pub description: String,
    /// Signed amount: income non-negative, expense/transfer non-positive
    pub amount: Decimal,
    pub tx_type: TransactionType,
    pub category: Option<String>,
    pub account_name: String,
    /// Raw source fields retained for audit
    pub raw: Vec<(String, String)>,
}

impl TransactionCandidate {
    /// Normalize the amount sign for the canonical convention, regardless of
    /// the sign convention used by the source format
    pub fn normalize_sign(amount: Decimal, tx_type: TransactionType) -> Decimal {
        match tx_type {
            TransactionType::Income => amount.abs(),
            TransactionType::Expense | TransactionType::Transfer => -amount.abs(),
        }
    }
}

/// The durable record after dedup resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTransaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub tx_type: TransactionType,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersistedTransaction {
    /// Build a new record from a candidate for the given account
    pub fn from_candidate(candidate: &TransactionCandidate, account_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            date: candidate.date,
            description: candidate.description.clone(),
            amount: candidate.amount,
            tx_type: candidate.tx_type,
            category: candidate.category.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}
