//! Account database operations

use chrono::Utc;
use florin_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Look up an account by name, creating it if absent
///
/// New accounts created during an import get a fresh id; the worker caches
/// results per job so each name is resolved at most once per pass.
pub async fn get_or_create_account(pool: &SqlitePool, name: &str) -> Result<Uuid> {
    let existing = sqlx::query("SELECT id FROM accounts WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    if let Some(row) = existing {
        let id: String = row.get("id");
        return Uuid::parse_str(&id)
            .map_err(|e| florin_common::Error::Internal(format!("Corrupt account id: {}", e)));
    }

    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO accounts (id, name, created_at) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(name)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;

    tracing::info!(account = %name, "Created new account");
    Ok(id)
}
