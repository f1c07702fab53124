//! Account model.
//!
//! Accounts are owned by the wider read-it-later service; here they only
//! serve as the owner of API keys.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents an account record from the database.
///
/// # Database Table
///
/// Maps to the `accounts` table. Deleting an account deletes its API keys
/// (`ON DELETE CASCADE` on `api_keys.account_id`).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    /// Unique identifier, referenced by `api_keys.account_id`
    pub id: Uuid,

    /// Login name, unique
    pub username: String,

    pub created_at: DateTime<Utc>,
}
