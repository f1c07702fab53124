//! PostgreSQL-backed credential store.

use super::{ApiKeyStore, StoreError};
use crate::{
    db::DbPool,
    models::{
        account::Account,
        api_key::{ApiKeyCredential, ApiKeyRow},
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

const API_KEY_COLUMNS: &str =
    "id, account_id, name, key_hash, created_at, expires_at, is_active, last_used_at";

#[derive(Debug, Clone)]
pub struct PgApiKeyStore {
    pool: DbPool,
}

impl PgApiKeyStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fetch the account named `username`, creating it if needed.
    pub async fn ensure_account(&self, username: &str) -> Result<Account, StoreError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (username)
            VALUES ($1)
            ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username
            RETURNING id, username, created_at
            "#,
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }
}

#[async_trait]
impl ApiKeyStore for PgApiKeyStore {
    async fn insert(&self, credential: &ApiKeyCredential) -> Result<(), StoreError> {
        let row = ApiKeyRow::try_from(credential)?;

        let result = sqlx::query(
            r#"
            INSERT INTO api_keys (id, account_id, name, key_hash, created_at, expires_at, is_active, last_used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(row.id)
        .bind(row.account_id)
        .bind(&row.name)
        .bind(&row.key_hash)
        .bind(row.created_at)
        .bind(row.expires_at)
        .bind(row.is_active)
        .bind(row.last_used_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(row.id));
        }

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ApiKeyCredential>, StoreError> {
        let row = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<ApiKeyCredential>, StoreError> {
        let rows = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE account_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update(&self, credential: &ApiKeyCredential) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE api_keys
            SET name = $2, expires_at = $3, is_active = $4
            WHERE id = $1
            "#,
        )
        .bind(credential.id())
        .bind(credential.name())
        .bind(credential.expires_at())
        .bind(credential.is_active())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1 AND account_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_usage(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        // Single-column write; concurrent callers race harmlessly and the
        // timestamp never goes backwards.
        sqlx::query(
            r#"
            UPDATE api_keys
            SET last_used_at = GREATEST(COALESCE(last_used_at, $2), $2)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
