//! Transaction database operations
//!
//! The worker only issues create/update instructions here; dedup decisions
//! are made upstream against an in-memory snapshot.

use chrono::NaiveDate;
use florin_common::{Error, Result};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{PersistedTransaction, TransactionType};

/// Insert a new transaction record
pub async fn insert_transaction(pool: &SqlitePool, tx: &PersistedTransaction) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, account_id, date, description, amount, tx_type, category,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(tx.id.to_string())
    .bind(tx.account_id.to_string())
    .bind(tx.date.to_string())
    .bind(&tx.description)
    .bind(tx.amount.to_string())
    .bind(tx.tx_type.as_str())
    .bind(&tx.category)
    .bind(tx.created_at.to_rfc3339())
    .bind(tx.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Update the mutable fields of an existing transaction
pub async fn update_transaction(pool: &SqlitePool, tx: &PersistedTransaction) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE transactions
        SET description = ?, category = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&tx.description)
    .bind(&tx.category)
    .bind(tx.updated_at.to_rfc3339())
    .bind(tx.id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Transaction not found: {}", tx.id)));
    }
    Ok(())
}

/// Fetch the known transactions for one account within a date window,
/// ordered by date then insertion
pub async fn list_account_transactions(
    pool: &SqlitePool,
    account_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<PersistedTransaction>> {
    let rows = sqlx::query(
        r#"
        SELECT id, account_id, date, description, amount, tx_type, category,
               created_at, updated_at
        FROM transactions
        WHERE account_id = ? AND date >= ? AND date <= ?
        ORDER BY date, created_at
        "#,
    )
    .bind(account_id.to_string())
    .bind(from.to_string())
    .bind(to.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_transaction).collect()
}

/// Count all transactions for an account (test and diagnostics helper)
pub async fn count_account_transactions(pool: &SqlitePool, account_id: Uuid) -> Result<u64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE account_id = ?")
        .bind(account_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count as u64)
}

fn row_to_transaction(row: sqlx::sqlite::SqliteRow) -> Result<PersistedTransaction> {
    let id: String = row.get("id");
    let account_id: String = row.get("account_id");
    let date: String = row.get("date");
    let amount: String = row.get("amount");
    let tx_type: String = row.get("tx_type");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(PersistedTransaction {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Internal(format!("Corrupt transaction id: {}", e)))?,
        account_id: Uuid::parse_str(&account_id)
            .map_err(|e| Error::Internal(format!("Corrupt account id: {}", e)))?,
        date: date
            .parse::<NaiveDate>()
            .map_err(|e| Error::Internal(format!("Corrupt date: {}", e)))?,
        description: row.get("description"),
        amount: amount
            .parse::<Decimal>()
            .map_err(|e| Error::Internal(format!("Corrupt amount: {}", e)))?,
        tx_type: TransactionType::parse(&tx_type)
            .ok_or_else(|| Error::Internal(format!("Corrupt transaction type: {}", tx_type)))?,
        category: row.get("category"),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| Error::Internal(format!("Corrupt created_at: {}", e)))?
            .with_timezone(&chrono::Utc),
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| Error::Internal(format!("Corrupt updated_at: {}", e)))?
            .with_timezone(&chrono::Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionCandidate;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    fn sample(account_id: Uuid, date: &str, description: &str) -> PersistedTransaction {
        let candidate = TransactionCandidate {
            date: date.parse().unwrap(),
            description: description.to_string(),
            amount: "-12.34".parse().unwrap(),
            tx_type: TransactionType::Expense,
            category: Some("Food".to_string()),
            account_name: "Checking".to_string(),
            raw: Vec::new(),
        };
        PersistedTransaction::from_candidate(&candidate, account_id)
    }

    #[tokio::test]
    async fn round_trips_through_sqlite() {
        let pool = test_pool().await;
        let account_id = crate::db::accounts::get_or_create_account(&pool, "Checking")
            .await
            .unwrap();
        let tx = sample(account_id, "2024-01-05", "Coffee");
        insert_transaction(&pool, &tx).await.unwrap();

        let from = "2024-01-01".parse().unwrap();
        let to = "2024-01-31".parse().unwrap();
        let loaded = list_account_transactions(&pool, account_id, from, to)
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, tx.id);
        assert_eq!(loaded[0].amount, tx.amount);
        assert_eq!(loaded[0].tx_type, TransactionType::Expense);
    }

    #[tokio::test]
    async fn date_window_filters() {
        let pool = test_pool().await;
        let account_id = crate::db::accounts::get_or_create_account(&pool, "Checking")
            .await
            .unwrap();
        insert_transaction(&pool, &sample(account_id, "2024-01-05", "Inside"))
            .await
            .unwrap();
        insert_transaction(&pool, &sample(account_id, "2024-06-05", "Outside"))
            .await
            .unwrap();

        let from = "2024-01-01".parse().unwrap();
        let to = "2024-01-31".parse().unwrap();
        let loaded = list_account_transactions(&pool, account_id, from, to)
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].description, "Inside");
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let pool = test_pool().await;
        let tx = sample(Uuid::new_v4(), "2024-01-05", "Ghost");
        let err = update_transaction(&pool, &tx).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
