//! API key service: issuance, authentication and lifecycle management.
//!
//! All operations are scoped to an owning account. A key belonging to another
//! account is reported as not found, so one account cannot discover the ids of another.

use crate::{
    crypto::generate_secret,
    error::AppError,
    models::api_key::ApiKeyCredential,
    store::ApiKeyStore,
    token::{PresentedToken, format_token},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Identity attached to a request that passed API key authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    /// ID of the API key the request authenticated with
    pub api_key_id: Uuid,

    /// Account the request acts as
    pub account_id: Uuid,
}

/// Changes requested through `PATCH`. `None` fields are left alone.
#[derive(Debug, Default)]
pub struct ApiKeyPatch {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    /// `Some(None)` clears the expiry.
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// A newly issued key together with the token shown to its owner once.
#[derive(Debug)]
pub struct IssuedKey {
    pub credential: ApiKeyCredential,
    pub token: String,
}

#[derive(Clone)]
pub struct ApiKeyService {
    store: Arc<dyn ApiKeyStore>,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn ApiKeyStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn ApiKeyStore {
        self.store.as_ref()
    }

    /// Create a key for `owner_id`.
    ///
    /// # Process
    ///
    /// 1. Validate the name
    /// 2. Generate a random secret and store only its hash
    /// 3. Return the credential with the token (only time it's shown)
    pub async fn issue(
        &self,
        owner_id: Uuid,
        name: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<IssuedKey, AppError> {
        let name = validate_name(name)?;

        let secret = generate_secret();
        let mut credential = ApiKeyCredential::new(owner_id);
        credential.set_name(name);
        credential.set_expires_at(expires_at);
        credential.set_key(&secret)?;

        self.store.insert(&credential).await?;
        tracing::info!(api_key_id = %credential.id(), account_id = %owner_id, "API key issued");

        let token = format_token(credential.id(), &secret);
        Ok(IssuedKey { credential, token })
    }

    /// Resolve a presented token to the identity it grants.
    ///
    /// Usage is recorded only when the key is valid, so failed attempts never
    /// touch `last_used_at`.
    pub async fn authenticate(&self, raw_token: &str) -> Result<AuthContext, AppError> {
        let token = PresentedToken::parse(raw_token).ok_or(AppError::Unauthorized)?;

        let credential = self
            .store
            .get(token.key_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !credential.is_valid(token.secret) {
            tracing::debug!(api_key_id = %credential.id(), status = ?credential.status(), "API key rejected");
            return Err(AppError::Unauthorized);
        }

        self.store.record_usage(credential.id(), Utc::now()).await?;

        Ok(AuthContext {
            api_key_id: credential.id(),
            account_id: credential.owner_id(),
        })
    }

    pub async fn list(&self, owner_id: Uuid) -> Result<Vec<ApiKeyCredential>, AppError> {
        Ok(self.store.list_for_owner(owner_id).await?)
    }

    pub async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<ApiKeyCredential, AppError> {
        self.store
            .get(id)
            .await?
            .filter(|credential| credential.owner_id() == owner_id)
            .ok_or(AppError::ApiKeyNotFound)
    }

    pub async fn update(
        &self,
        owner_id: Uuid,
        id: Uuid,
        patch: ApiKeyPatch,
    ) -> Result<ApiKeyCredential, AppError> {
        let name = patch.name.as_deref().map(validate_name).transpose()?;

        self.modify(owner_id, id, |credential| {
            if let Some(name) = name {
                credential.set_name(name);
            }
            if let Some(active) = patch.is_active {
                credential.set_active(active);
            }
            if let Some(expires_at) = patch.expires_at {
                credential.set_expires_at(expires_at);
            }
        })
        .await
    }

    /// Expire the key `days` from now, or never when `days` is `None`.
    pub async fn renew(
        &self,
        owner_id: Uuid,
        id: Uuid,
        days: Option<i64>,
    ) -> Result<ApiKeyCredential, AppError> {
        self.modify(owner_id, id, |credential| credential.renew(days))
            .await
    }

    /// Disable the key. Revoking twice succeeds both times.
    pub async fn revoke(&self, owner_id: Uuid, id: Uuid) -> Result<ApiKeyCredential, AppError> {
        let credential = self
            .modify(owner_id, id, ApiKeyCredential::revoke)
            .await?;
        tracing::info!(api_key_id = %id, "API key revoked");
        Ok(credential)
    }

    /// Remove the key for good.
    pub async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<(), AppError> {
        if !self.store.delete(owner_id, id).await? {
            return Err(AppError::ApiKeyNotFound);
        }

        tracing::info!(api_key_id = %id, "API key deleted");
        Ok(())
    }

    async fn modify(
        &self,
        owner_id: Uuid,
        id: Uuid,
        change: impl FnOnce(&mut ApiKeyCredential),
    ) -> Result<ApiKeyCredential, AppError> {
        let mut credential = self.get(owner_id, id).await?;
        change(&mut credential);

        if !self.store.update(&credential).await? {
            // Deleted between the read and the write.
            return Err(AppError::ApiKeyNotFound);
        }

        Ok(credential)
    }
}

fn validate_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();

    if name.is_empty() {
        return Err(AppError::InvalidRequest("name must not be empty".to_string()));
    }
    if name.chars().count() > 255 {
        return Err(AppError::InvalidRequest(
            "name must be at most 255 characters".to_string(),
        ));
    }

    Ok(name)
}
