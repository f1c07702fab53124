//! Format of the bearer token handed to account holders.
//!
//! `rlk_<key-id>.<secret>`: the key id (UUID, simple hex form) is public and
//! used to find the stored credential; only the secret part is checked
//! against the stored hash.

use uuid::Uuid;

const TOKEN_PREFIX: &str = "rlk_";

/// A token as presented by a client, split into lookup id and secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedToken<'a> {
    pub key_id: Uuid,
    pub secret: &'a str,
}

impl<'a> PresentedToken<'a> {
    /// Split a raw token. Returns `None` for anything not shaped like an issued token.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let (id, secret) = raw.trim().strip_prefix(TOKEN_PREFIX)?.split_once('.')?;

        if secret.is_empty() {
            return None;
        }

        Some(Self {
            key_id: Uuid::try_parse(id).ok()?,
            secret,
        })
    }
}

/// Build the token shown to the account holder at issuance.
pub fn format_token(key_id: Uuid, secret: &str) -> String {
    format!("{TOKEN_PREFIX}{}.{secret}", key_id.simple())
}
