//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the `X-API-Key` or `Authorization` header
//! 2. Validate it through [`ApiKeyService::authenticate`]
//! 3. Inject authentication context into the request
//! 4. Reject unauthorized requests with HTTP 401

use crate::{AppState, error::AppError, services::api_key_service::ApiKeyService};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

pub use crate::services::api_key_service::AuthContext;

/// Header carrying the raw token.
pub const API_KEY_HEADER: &str = "x-api-key";

/// API key authentication middleware function.
///
/// # Headers
///
/// Either of:
/// ```text
/// X-API-Key: rlk_<id>.<secret>
/// Authorization: Bearer rlk_<id>.<secret>
/// ```
///
/// `X-API-Key` wins when both are present.
///
/// # Returns
///
/// - `Ok(Response)` if authenticated successfully (calls next handler)
/// - `Err(AppError::Unauthorized)` if authentication fails (returns 401)
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_context = authenticate(&state.api_keys, request.headers())
        .await
        .inspect_err(|err| {
            // Never log the presented token.
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                error = %err,
                "API key authentication failed"
            );
        })?;

    // Route handlers can now extract this using Extension<AuthContext>
    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

async fn authenticate(service: &ApiKeyService, headers: &HeaderMap) -> Result<AuthContext, AppError> {
    let token = extract_token(headers).ok_or(AppError::Unauthorized)?;
    service.authenticate(token).await
}

/// Pull the raw token out of the request headers.
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(API_KEY_HEADER) {
        return value.to_str().ok().map(str::trim);
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
}
