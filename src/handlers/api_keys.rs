//! API key management HTTP handlers.
//!
//! This module implements the API key endpoints:
//! - POST /api/v1/api-keys - Issue a new key (the only response carrying the token)
//! - GET /api/v1/api-keys - List keys of the authenticated account
//! - GET /api/v1/api-keys/{id} - Get one key
//! - PATCH /api/v1/api-keys/{id} - Rename, (de)activate, set or clear expiry
//! - POST /api/v1/api-keys/{id}/renew - Move the expiry relative to now
//! - POST /api/v1/api-keys/{id}/revoke - Disable a key
//! - DELETE /api/v1/api-keys/{id} - Remove a key

use crate::{
    AppState,
    error::AppError,
    middleware::auth::AuthContext,
    models::api_key::{
        ApiKeyResponse, CreateApiKeyRequest, RenewApiKeyRequest, UpdateApiKeyRequest,
    },
    services::api_key_service::ApiKeyPatch,
};
use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use uuid::Uuid;

/// Issue a new API key.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Reader app",
///   "expires_at": "2026-01-01T00:00:00Z"  // optional
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: The key, including `key` (shown only here)
/// - **Error (400)**: Missing or blank name, malformed body
/// - **Error (401)**: Invalid API key
pub async fn create_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<CreateApiKeyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiKeyResponse>), AppError> {
    let request = parse_body(payload)?;

    let issued = state
        .api_keys
        .issue(auth.account_id, &request.name, request.expires_at)
        .await?;

    let response = ApiKeyResponse::from(&issued.credential).with_key(issued.token);
    Ok((StatusCode::CREATED, Json(response)))
}

/// List all API keys of the authenticated account, newest first.
pub async fn list_api_keys(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ApiKeyResponse>>, AppError> {
    let keys = state.api_keys.list(auth.account_id).await?;

    Ok(Json(keys.iter().map(ApiKeyResponse::from).collect()))
}

/// Get a specific API key.
///
/// Returns 404 if the key doesn't exist OR belongs to another account.
pub async fn get_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<ApiKeyResponse>, AppError> {
    let credential = state.api_keys.get(auth.account_id, parse_id(&id)?).await?;

    Ok(Json(ApiKeyResponse::from(&credential)))
}

/// Update name, active flag or expiry of an API key.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "New name",        // optional
///   "is_active": true,          // optional
///   "expires_at": null          // optional, null removes the expiry
/// }
/// ```
pub async fn update_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateApiKeyRequest>, JsonRejection>,
) -> Result<Json<ApiKeyResponse>, AppError> {
    let id = parse_id(&id)?;
    let request = parse_body(payload)?;

    let patch = ApiKeyPatch {
        name: request.name,
        is_active: request.is_active,
        expires_at: request.expires_at,
    };
    let credential = state.api_keys.update(auth.account_id, id, patch).await?;

    Ok(Json(ApiKeyResponse::from(&credential)))
}

/// Renew an API key.
///
/// `{"days": 30}` expires the key 30 days from now; `{"days": null}` removes
/// the expiry. The body is required: a request without one is a 400 and
/// leaves the key untouched.
pub async fn renew_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    payload: Result<Json<RenewApiKeyRequest>, JsonRejection>,
) -> Result<Json<ApiKeyResponse>, AppError> {
    let id = parse_id(&id)?;
    let days = parse_body(payload)?.days;

    let credential = state.api_keys.renew(auth.account_id, id, days).await?;

    Ok(Json(ApiKeyResponse::from(&credential)))
}

/// Revoke an API key. Revoking an already revoked key succeeds.
pub async fn revoke_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<ApiKeyResponse>, AppError> {
    let credential = state.api_keys.revoke(auth.account_id, parse_id(&id)?).await?;

    Ok(Json(ApiKeyResponse::from(&credential)))
}

/// Delete an API key.
///
/// # Response
///
/// - **Success (204 No Content)**
/// - **Error (404)**: Key not found (including a second delete of the same key)
pub async fn delete_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.api_keys.delete(auth.account_id, parse_id(&id)?).await?;

    Ok(StatusCode::NO_CONTENT)
}

// Ids that are not UUIDs cannot exist, so they are reported as not found.
fn parse_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::try_parse(id).map_err(|_| AppError::ApiKeyNotFound)
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))
}
