//! Identity of the authenticated caller.

use crate::middleware::auth::AuthContext;
use axum::{Extension, Json};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub account_id: Uuid,
    pub api_key_id: Uuid,
}

/// `GET /api/v1/me`: who the presented API key authenticates as.
pub async fn whoami(Extension(auth): Extension<AuthContext>) -> Json<MeResponse> {
    Json(MeResponse {
        account_id: auth.account_id,
        api_key_id: auth.api_key_id,
    })
}
