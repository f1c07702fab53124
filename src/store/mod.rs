//! Persistence of API key credentials.
//!
//! The service and middleware only talk to [`ApiKeyStore`]; the server runs
//! on [`PgApiKeyStore`], tests on [`MemoryApiKeyStore`].

use crate::models::api_key::{ApiKeyCredential, KeyError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryApiKeyStore;
pub use postgres::PgApiKeyStore;

/// Storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A credential without a secret was handed to the store.
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("API key {0} already exists")]
    Duplicate(Uuid),
}

/// Durable storage for credentials, addressed by key id.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Persist a new credential. Its secret must already be set.
    async fn insert(&self, credential: &ApiKeyCredential) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<ApiKeyCredential>, StoreError>;

    /// All credentials of one account, newest first.
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<ApiKeyCredential>, StoreError>;

    /// Write back name, expiry and active flag.
    ///
    /// Owner, hash and creation time are never rewritten, and neither is
    /// `last_used_at`: [`record_usage`](Self::record_usage) is its only
    /// writer, so a stale copy cannot move it backwards. Returns `false` if
    /// the credential does not exist.
    async fn update(&self, credential: &ApiKeyCredential) -> Result<bool, StoreError>;

    /// Remove a credential of `owner_id`. Returns `false` if there was none.
    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool, StoreError>;

    /// Move `last_used_at` forward to `at`; an already later value is kept.
    async fn record_usage(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Connectivity check for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}
