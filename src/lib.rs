//! API key credentials for a read-it-later service.
//!
//! Accounts use long-lived API keys to call the service without a session
//! password. This crate issues those keys, stores only salted hashes of
//! their secrets, and authenticates API requests with them.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key, salted HMAC-SHA256 hash, constant-time check
//! - **Format**: JSON requests/responses

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod token;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use services::api_key_service::ApiKeyService;
use std::sync::Arc;
use store::ApiKeyStore;
use tower_http::trace::TraceLayer;

/// State shared with every handler.
#[derive(Clone)]
pub struct AppState {
    pub api_keys: ApiKeyService,
}

impl AppState {
    pub fn new(store: Arc<dyn ApiKeyStore>) -> Self {
        Self {
            api_keys: ApiKeyService::new(store),
        }
    }
}

/// Build the HTTP router with all routes and middleware.
pub fn router(state: AppState) -> Router {
    use handlers::{api_keys, health, me};

    // Everything under /api/v1 requires a valid API key
    let authenticated_routes = Router::new()
        .route("/api/v1/me", get(me::whoami))
        .route(
            "/api/v1/api-keys",
            post(api_keys::create_api_key).get(api_keys::list_api_keys),
        )
        .route(
            "/api/v1/api-keys/{id}",
            get(api_keys::get_api_key)
                .patch(api_keys::update_api_key)
                .delete(api_keys::delete_api_key),
        )
        .route(
            "/api/v1/api-keys/{id}/renew",
            post(api_keys::renew_api_key),
        )
        .route(
            "/api/v1/api-keys/{id}/revoke",
            post(api_keys::revoke_api_key),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(health::health_check))
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
