//! One-way hashing and generation of API key secrets.
//!
//! Secrets are never stored. What is stored is a salted HMAC-SHA256 digest:
//! a fresh 16-byte salt is drawn for every hash and used as the HMAC key
//! over the secret bytes. The persisted form is
//! `hmac-sha256$<salt-hex>$<digest-hex>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "hmac-sha256";
const SALT_LEN: usize = 16;

/// Stored, one-way representation of an API key secret.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretHash(String);

impl SecretHash {
    /// Hash `secret` with a freshly generated salt.
    pub fn derive(secret: &str) -> Self {
        let salt: [u8; SALT_LEN] = rand::random();
        let digest = mac_for(&salt, secret).finalize().into_bytes();

        Self(format!(
            "{SCHEME}${}${}",
            hex::encode(salt),
            hex::encode(digest)
        ))
    }

    /// Wrap a value previously produced by [`SecretHash::derive`], e.g. one read from the database.
    ///
    /// The value is not checked here; a malformed hash simply never verifies.
    pub fn from_stored(stored: impl Into<String>) -> Self {
        Self(stored.into())
    }

    /// Check `candidate` against this hash.
    ///
    /// The digest comparison is constant-time. Empty candidates and
    /// malformed stored values return `false`.
    pub fn verify(&self, candidate: &str) -> bool {
        if candidate.is_empty() {
            return false;
        }

        let Some((salt, digest)) = self.decode() else {
            return false;
        };

        mac_for(&salt, candidate).verify_slice(&digest).is_ok()
    }

    /// The persisted representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn decode(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        let mut parts = self.0.split('$');

        if parts.next()? != SCHEME {
            return None;
        }

        let salt = hex::decode(parts.next()?).ok()?;
        let digest = hex::decode(parts.next()?).ok()?;

        if parts.next().is_some() || salt.len() != SALT_LEN || digest.is_empty() {
            return None;
        }

        Some((salt, digest))
    }
}

// Keeps digests out of logs and panic messages.
impl fmt::Debug for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretHash").field(&"<redacted>").finish()
    }
}

fn mac_for(salt: &[u8], secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = HmacSha256::new_from_slice(salt).expect("HMAC key length is valid");
    mac.update(secret.as_bytes());
    mac
}

/// Generate a cryptographically secure random secret.
///
/// # Output
///
/// 64 hex characters (32 random bytes)
pub fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}
