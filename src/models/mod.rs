//! Data models representing database entities and API payloads.

/// Account (API key owner) model
pub mod account;
/// API key credential model
pub mod api_key;
