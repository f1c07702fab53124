//! API key credential model.
//!
//! An API key lets an account call the API without a session password. The
//! plaintext secret is shown to the account holder once, at issuance; only a
//! salted one-way hash of it is ever kept (see [`crate::crypto`]).
//!
//! Validity is computed, never stored: a key is usable when the presented
//! secret matches, the key is active, and its expiry (if any) has not passed
//! at the moment of the check.

use crate::crypto::SecretHash;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Errors raised by credential mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// `set_key` was given an empty or whitespace-only secret.
    #[error("API key secret must not be empty")]
    EmptySecret,

    /// The credential has no secret yet and cannot be persisted.
    #[error("API key has no secret set")]
    MissingSecret,
}

/// Lifecycle state derived from the active flag and the expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    Active,
    Expired,
    /// Administratively disabled. Takes precedence over `Expired`.
    Revoked,
}

/// An API key bound to exactly one account.
#[derive(Debug, Clone)]
pub struct ApiKeyCredential {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    key_hash: Option<SecretHash>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
    last_used_at: Option<DateTime<Utc>>,
}

impl ApiKeyCredential {
    /// Create an active, never-expiring, never-used credential for `owner_id`.
    ///
    /// No secret is set yet; until [`set_key`](Self::set_key) is called every
    /// validation fails.
    pub fn new(owner_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: String::new(),
            key_hash: None,
            created_at: Utc::now(),
            expires_at: None,
            is_active: true,
            last_used_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The owning account. Fixed at construction.
    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Hash and store `secret`. The plaintext is not retained.
    pub fn set_key(&mut self, secret: &str) -> Result<(), KeyError> {
        if secret.trim().is_empty() {
            return Err(KeyError::EmptySecret);
        }

        self.key_hash = Some(SecretHash::derive(secret));
        Ok(())
    }

    /// The stored hash. There is no way to get the plaintext back.
    pub fn key_hash(&self) -> Option<&SecretHash> {
        self.key_hash.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Override the creation time, e.g. when importing existing keys.
    pub fn set_created_at(&mut self, created_at: DateTime<Utc>) {
        self.created_at = created_at;
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// `None` means the key never expires.
    pub fn set_expires_at(&mut self, expires_at: Option<DateTime<Utc>>) {
        self.expires_at = expires_at;
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    /// Administrative override of the usage timestamp. Unlike
    /// [`record_usage`](Self::record_usage) this may move it backwards.
    pub fn set_last_used_at(&mut self, last_used_at: Option<DateTime<Utc>>) {
        self.last_used_at = last_used_at;
    }

    /// Pure secret check. Ignores the active flag and expiry.
    pub fn validate_key(&self, candidate: &str) -> bool {
        self.key_hash
            .as_ref()
            .is_some_and(|hash| hash.verify(candidate))
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// True iff an expiry is set and lies strictly before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    /// The check authentication must go through. Does not record usage.
    pub fn is_valid(&self, candidate: &str) -> bool {
        self.is_valid_at(candidate, Utc::now())
    }

    pub fn is_valid_at(&self, candidate: &str, now: DateTime<Utc>) -> bool {
        self.validate_key(candidate) && self.is_active() && !self.is_expired_at(now)
    }

    pub fn status(&self) -> KeyStatus {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> KeyStatus {
        if !self.is_active {
            KeyStatus::Revoked
        } else if self.is_expired_at(now) {
            KeyStatus::Expired
        } else {
            KeyStatus::Active
        }
    }

    /// Set the expiry to `days` from now, or remove it when `days` is `None`.
    ///
    /// The new expiry replaces the old one. Zero and negative values are
    /// accepted and leave the key expired. Day counts reaching before
    /// 4713 BC stop there, the earliest instant the database can store.
    pub fn renew(&mut self, days: Option<i64>) {
        self.renew_at(days, Utc::now());
    }

    pub fn renew_at(&mut self, days: Option<i64>, now: DateTime<Utc>) {
        self.expires_at = days.map(|days| days_from(now, days));
    }

    /// Disable the key. Idempotent; reversible with `set_active(true)`.
    pub fn revoke(&mut self) {
        self.is_active = false;
    }

    /// Mark the key as used now. Call only after `is_valid` succeeded.
    pub fn record_usage(&mut self) {
        self.record_usage_at(Utc::now());
    }

    /// Never moves `last_used_at` backwards.
    pub fn record_usage_at(&mut self, now: DateTime<Utc>) {
        if self.last_used_at.is_none_or(|last| last < now) {
            self.last_used_at = Some(now);
        }
    }
}

/// First day of 4713 BC, the lower bound of a Postgres `timestamptz`.
///
/// The upper bound (294276 AD) lies beyond chrono's range, so only this end
/// needs clamping.
pub fn earliest_storable() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(-4712, 1, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
        .and_utc()
}

// Out-of-range day counts saturate instead of panicking.
fn days_from(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(if days < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
        .max(earliest_storable())
}

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table with columns:
/// - `id`: Unique identifier (UUID), also the public part of the issued token
/// - `account_id`: Owning account, cascades on account deletion
/// - `name`: Human-readable label
/// - `key_hash`: Salted HMAC-SHA256 hash of the secret
/// - `created_at`, `expires_at`, `last_used_at`: Lifecycle timestamps
/// - `is_active`: Whether the key has been revoked
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKeyRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub key_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<ApiKeyRow> for ApiKeyCredential {
    fn from(row: ApiKeyRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.account_id,
            name: row.name,
            key_hash: Some(SecretHash::from_stored(row.key_hash)),
            created_at: row.created_at,
            expires_at: row.expires_at,
            is_active: row.is_active,
            last_used_at: row.last_used_at,
        }
    }
}

impl TryFrom<&ApiKeyCredential> for ApiKeyRow {
    type Error = KeyError;

    fn try_from(credential: &ApiKeyCredential) -> Result<Self, Self::Error> {
        let key_hash = credential.key_hash.as_ref().ok_or(KeyError::MissingSecret)?;

        Ok(Self {
            id: credential.id,
            account_id: credential.owner_id,
            name: credential.name.clone(),
            key_hash: key_hash.as_str().to_string(),
            created_at: credential.created_at,
            expires_at: credential.expires_at,
            is_active: credential.is_active,
            last_used_at: credential.last_used_at,
        })
    }
}

/// Request body for creating an API key.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "Reader app",
///   "expires_at": "2026-01-01T00:00:00Z"
/// }
/// ```
///
/// `expires_at` is optional; without it the key never expires. A date in
/// the past is accepted and yields a key that is expired from the start.
#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request body for `PATCH /api/v1/api-keys/{id}`.
///
/// Absent fields are left unchanged; `"expires_at": null` removes the expiry.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateApiKeyRequest {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub is_active: Option<bool>,

    #[serde(default, deserialize_with = "present_or_null")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// Request body for renewing an API key.
///
/// `days` may be any integer; `null` or absent means "never expires". The
/// body itself is required.
#[derive(Debug, Deserialize)]
pub struct RenewApiKeyRequest {
    #[serde(default)]
    pub days: Option<i64>,
}

// Distinguishes an explicit `null` (Some(None)) from an absent field (None).
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Response body for API key endpoints.
///
/// Never carries the secret or its hash. The secret is added only to the
/// creation response, through [`ApiKeyResponse::with_key`].
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "name": "Reader app",
///   "status": "active",
///   "created_at": "2025-12-20T10:00:00Z",
///   "expires_at": null,
///   "last_used_at": null,
///   "is_active": true
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,

    /// Plaintext token, present only in the response that created it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    pub name: String,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl ApiKeyResponse {
    pub fn with_key(mut self, token: String) -> Self {
        self.key = Some(token);
        self
    }
}

impl From<&ApiKeyCredential> for ApiKeyResponse {
    fn from(credential: &ApiKeyCredential) -> Self {
        Self {
            id: credential.id(),
            key: None,
            name: credential.name().to_string(),
            status: credential.status(),
            created_at: credential.created_at(),
            expires_at: credential.expires_at(),
            last_used_at: credential.last_used_at(),
            is_active: credential.is_active(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn credential_with_key(secret: &str) -> ApiKeyCredential {
        let mut credential = ApiKeyCredential::new(Uuid::new_v4());
        credential.set_key(secret).unwrap();
        credential
    }

    #[test]
    fn new_credential_defaults() {
        let owner = Uuid::new_v4();
        let before = Utc::now();
        let credential = ApiKeyCredential::new(owner);

        assert_eq!(credential.owner_id(), owner);
        assert!(credential.is_active());
        assert!(credential.expires_at().is_none());
        assert!(credential.key_hash().is_none());
        assert!(credential.last_used_at().is_none());
        assert!(credential.created_at() >= before);
        assert!(credential.created_at() <= Utc::now());
    }

    #[test]
    fn name_and_created_at_are_plain_fields() {
        let mut credential = ApiKeyCredential::new(Uuid::new_v4());
        let date = "2023-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();

        credential.set_name("Test API Key");
        credential.set_created_at(date);

        assert_eq!(credential.name(), "Test API Key");
        assert_eq!(credential.created_at(), date);
    }

    #[test]
    fn stored_hash_never_equals_the_secret() {
        for secret in ["abc123", "x", "test_api_key_0123456789abcdef", " padded "] {
            let credential = credential_with_key(secret);
            assert_ne!(credential.key_hash().unwrap().as_str(), secret);
        }
    }

    #[test]
    fn validate_key_matches_only_the_original_secret() {
        for secret in ["abc123", "test_api_key_0123456789abcdef"] {
            let credential = credential_with_key(secret);

            assert!(credential.validate_key(secret));
            assert!(!credential.validate_key(&format!("{secret}x")));
            assert!(!credential.validate_key("wrong_key"));
            assert!(!credential.validate_key(""));
        }
    }

    #[test]
    fn validate_key_without_secret_is_false() {
        let credential = ApiKeyCredential::new(Uuid::new_v4());

        assert!(!credential.validate_key(""));
        assert!(!credential.validate_key("anything"));
    }

    #[test]
    fn set_key_rejects_blank_secrets() {
        let mut credential = ApiKeyCredential::new(Uuid::new_v4());

        assert_eq!(credential.set_key(""), Err(KeyError::EmptySecret));
        assert_eq!(credential.set_key("  \t\n"), Err(KeyError::EmptySecret));
        assert!(credential.key_hash().is_none());
    }

    #[test]
    fn expiration_follows_the_deadline() {
        let mut credential = ApiKeyCredential::new(Uuid::new_v4());
        assert!(!credential.is_expired());

        credential.set_expires_at(Some(Utc::now() + Duration::days(7)));
        assert!(!credential.is_expired());

        credential.set_expires_at(Some(Utc::now() - Duration::days(1)));
        assert!(credential.is_expired());

        credential.set_expires_at(None);
        assert!(!credential.is_expired());
    }

    #[test]
    fn expiry_is_strictly_before_now() {
        let now = Utc::now();
        let mut credential = ApiKeyCredential::new(Uuid::new_v4());
        credential.set_expires_at(Some(now));

        assert!(!credential.is_expired_at(now));
        assert!(credential.is_expired_at(now + Duration::milliseconds(1)));
    }

    #[test]
    fn is_valid_is_the_conjunction_of_all_three_checks() {
        let now = Utc::now();

        for matching in [true, false] {
            for active in [true, false] {
                for expired in [true, false] {
                    let mut credential = credential_with_key("abc123");
                    credential.set_active(active);
                    credential.set_expires_at(Some(if expired {
                        now - Duration::days(1)
                    } else {
                        now + Duration::days(1)
                    }));

                    let candidate = if matching { "abc123" } else { "abc124" };
                    let expected = matching && active && !expired;

                    assert_eq!(
                        credential.is_valid_at(candidate, now),
                        expected,
                        "matching={matching} active={active} expired={expired}"
                    );
                }
            }
        }
    }

    #[test]
    fn is_valid_does_not_record_usage() {
        let credential = credential_with_key("abc123");

        assert!(credential.is_valid("abc123"));
        assert!(credential.last_used_at().is_none());
    }

    #[test]
    fn renew_measures_from_now_and_replaces_the_old_expiry() {
        let mut credential = ApiKeyCredential::new(Uuid::new_v4());
        credential.set_expires_at(Some(Utc::now() + Duration::days(30)));

        credential.renew(Some(60));

        let expires_at = credential.expires_at().unwrap();
        assert!(expires_at >= Utc::now() + Duration::days(59));
        assert!(expires_at <= Utc::now() + Duration::days(60));

        // A far-future expiry is replaced too, not kept.
        credential.set_expires_at(Some(Utc::now() + Duration::days(365)));
        credential.renew(Some(10));
        assert!(credential.expires_at().unwrap() <= Utc::now() + Duration::days(10));
    }

    #[test]
    fn renew_without_duration_clears_expiry() {
        let mut credential = ApiKeyCredential::new(Uuid::new_v4());

        credential.set_expires_at(Some(Utc::now() - Duration::days(3)));
        credential.renew(None);
        assert!(credential.expires_at().is_none());

        credential.renew(None);
        assert!(credential.expires_at().is_none());
        assert!(!credential.is_expired());
    }

    #[test]
    fn renew_accepts_zero_and_negative_days() {
        let now = Utc::now();
        let mut credential = ApiKeyCredential::new(Uuid::new_v4());

        credential.renew_at(Some(0), now);
        assert_eq!(credential.expires_at(), Some(now));
        assert!(credential.is_expired_at(now + Duration::seconds(1)));

        credential.renew_at(Some(-2), now);
        assert!(credential.is_expired_at(now));
    }

    #[test]
    fn renew_with_huge_values_saturates() {
        let now = Utc::now();
        let mut credential = ApiKeyCredential::new(Uuid::new_v4());

        credential.renew_at(Some(i64::MIN), now);
        assert!(credential.is_expired_at(now));
        assert_eq!(credential.expires_at(), Some(earliest_storable()));

        credential.renew_at(Some(i64::MAX), now);
        assert!(!credential.is_expired_at(now));
    }

    #[test]
    fn renew_never_goes_below_the_storable_range() {
        let now = Utc::now();
        let mut credential = ApiKeyCredential::new(Uuid::new_v4());

        // About 8200 years back: valid for chrono, too early for the database.
        credential.renew_at(Some(-3_000_000), now);
        assert_eq!(credential.expires_at(), Some(earliest_storable()));
        assert_eq!(
            (earliest_storable().year(), earliest_storable().ordinal()),
            (-4712, 1)
        );

        credential.renew_at(Some(-1), now);
        assert_eq!(credential.expires_at(), Some(now - Duration::days(1)));
    }

    #[test]
    fn revoke_is_idempotent_and_reversible() {
        let mut credential = ApiKeyCredential::new(Uuid::new_v4());

        credential.revoke();
        assert!(!credential.is_active());
        credential.revoke();
        assert!(!credential.is_active());

        credential.set_active(true);
        assert!(credential.is_active());
    }

    #[test]
    fn revoke_keeps_hash_and_expiry() {
        let mut credential = credential_with_key("abc123");
        let expires_at = Some(Utc::now() + Duration::days(5));
        credential.set_expires_at(expires_at);

        credential.revoke();

        assert!(credential.validate_key("abc123"));
        assert_eq!(credential.expires_at(), expires_at);
    }

    #[test]
    fn record_usage_sets_last_used_to_now() {
        let mut credential = ApiKeyCredential::new(Uuid::new_v4());

        credential.record_usage();

        let last_used = credential.last_used_at().unwrap();
        assert!((Utc::now() - last_used).num_seconds().abs() < 5);
    }

    #[test]
    fn record_usage_never_moves_backwards() {
        let now = Utc::now();
        let mut credential = ApiKeyCredential::new(Uuid::new_v4());

        credential.record_usage_at(now);
        credential.record_usage_at(now - Duration::minutes(5));
        assert_eq!(credential.last_used_at(), Some(now));

        let later = now + Duration::seconds(1);
        credential.record_usage_at(later);
        assert_eq!(credential.last_used_at(), Some(later));

        for _ in 0..3 {
            let previous = credential.last_used_at();
            credential.record_usage();
            assert!(credential.last_used_at() >= previous);
        }
    }

    #[test]
    fn last_used_can_be_overridden_administratively() {
        let mut credential = ApiKeyCredential::new(Uuid::new_v4());
        let date = "2023-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();

        credential.record_usage();
        credential.set_last_used_at(Some(date));

        assert_eq!(credential.last_used_at(), Some(date));
    }

    #[test]
    fn status_follows_the_state_machine() {
        let now = Utc::now();
        let mut credential = ApiKeyCredential::new(Uuid::new_v4());
        assert_eq!(credential.status_at(now), KeyStatus::Active);

        credential.set_expires_at(Some(now + Duration::hours(1)));
        assert_eq!(credential.status_at(now), KeyStatus::Active);
        // Time alone moves the key to expired.
        assert_eq!(credential.status_at(now + Duration::hours(2)), KeyStatus::Expired);

        credential.revoke();
        assert_eq!(credential.status_at(now), KeyStatus::Revoked);
        assert_eq!(credential.status_at(now + Duration::hours(2)), KeyStatus::Revoked);

        credential.set_active(true);
        assert_eq!(credential.status_at(now + Duration::hours(2)), KeyStatus::Expired);

        credential.renew_at(None, now);
        assert_eq!(credential.status_at(now + Duration::hours(2)), KeyStatus::Active);
    }

    #[test]
    fn revocation_round_trip_scenario() {
        let mut credential = ApiKeyCredential::new(Uuid::new_v4());
        credential.set_key("abc123").unwrap();
        assert!(credential.is_valid("abc123"));

        credential.revoke();
        assert!(!credential.is_valid("abc123"));

        credential.set_active(true);
        assert!(credential.is_valid("abc123"));
    }

    #[test]
    fn row_round_trip_preserves_validation() {
        let mut credential = credential_with_key("abc123");
        credential.set_name("Reader app");
        credential.record_usage();

        let row = ApiKeyRow::try_from(&credential).unwrap();
        assert_ne!(row.key_hash, "abc123");

        let restored = ApiKeyCredential::from(row);
        assert_eq!(restored.id(), credential.id());
        assert_eq!(restored.owner_id(), credential.owner_id());
        assert_eq!(restored.name(), "Reader app");
        assert_eq!(restored.last_used_at(), credential.last_used_at());
        assert!(restored.is_valid("abc123"));
    }

    #[test]
    fn row_requires_a_secret() {
        let credential = ApiKeyCredential::new(Uuid::new_v4());

        assert_eq!(
            ApiKeyRow::try_from(&credential).unwrap_err(),
            KeyError::MissingSecret
        );
    }

    #[test]
    fn update_request_tells_null_from_absent() {
        let absent: UpdateApiKeyRequest = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(absent.expires_at, None);

        let cleared: UpdateApiKeyRequest =
            serde_json::from_str(r#"{"expires_at":null}"#).unwrap();
        assert_eq!(cleared.expires_at, Some(None));

        let set: UpdateApiKeyRequest =
            serde_json::from_str(r#"{"expires_at":"2030-01-01T00:00:00Z"}"#).unwrap();
        assert!(matches!(set.expires_at, Some(Some(_))));
    }

    #[test]
    fn response_never_contains_the_hash() {
        let credential = credential_with_key("abc123");
        let hash = credential.key_hash().unwrap().as_str().to_string();

        let json = serde_json::to_value(ApiKeyResponse::from(&credential)).unwrap();
        assert!(json.get("key").is_none());
        assert!(!json.to_string().contains(&hash));
        assert_eq!(json["status"], "active");

        let created = ApiKeyResponse::from(&credential).with_key("rlk_token".to_string());
        let json = serde_json::to_value(created).unwrap();
        assert_eq!(json["key"], "rlk_token");
    }
}
