//! Domain models for florin-import

mod transaction;

pub use transaction::{PersistedTransaction, TransactionCandidate, TransactionType};
