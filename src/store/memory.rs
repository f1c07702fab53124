//! In-memory credential store.

use super::{ApiKeyStore, StoreError};
use crate::models::api_key::{ApiKeyCredential, ApiKeyRow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Keeps credentials in a map. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryApiKeyStore {
    keys: Arc<RwLock<HashMap<Uuid, ApiKeyCredential>>>,
}

impl MemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApiKeyStore for MemoryApiKeyStore {
    async fn insert(&self, credential: &ApiKeyCredential) -> Result<(), StoreError> {
        // Same rule as the database: no secret, no row.
        ApiKeyRow::try_from(credential)?;

        let mut keys = self.keys.write().await;
        if keys.contains_key(&credential.id()) {
            return Err(StoreError::Duplicate(credential.id()));
        }

        keys.insert(credential.id(), credential.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ApiKeyCredential>, StoreError> {
        Ok(self.keys.read().await.get(&id).cloned())
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<ApiKeyCredential>, StoreError> {
        let mut owned: Vec<_> = self
            .keys
            .read()
            .await
            .values()
            .filter(|credential| credential.owner_id() == owner_id)
            .cloned()
            .collect();

        owned.sort_by_key(|credential| std::cmp::Reverse(credential.created_at()));
        Ok(owned)
    }

    async fn update(&self, credential: &ApiKeyCredential) -> Result<bool, StoreError> {
        let mut keys = self.keys.write().await;

        let Some(stored) = keys.get_mut(&credential.id()) else {
            return Ok(false);
        };

        stored.set_name(credential.name());
        stored.set_expires_at(credential.expires_at());
        stored.set_active(credential.is_active());
        Ok(true)
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut keys = self.keys.write().await;

        let owned = keys
            .get(&id)
            .is_some_and(|credential| credential.owner_id() == owner_id);

        if owned {
            keys.remove(&id);
        }
        Ok(owned)
    }

    async fn record_usage(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(credential) = self.keys.write().await.get_mut(&id) {
            credential.record_usage_at(at);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
