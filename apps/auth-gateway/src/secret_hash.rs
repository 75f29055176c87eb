// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cognito secret hash.
//!
//! Every call made on behalf of an app client that has a secret must carry
//! `SECRET_HASH = Base64(HMAC-SHA256(client_secret, username || client_id))`.
//! The value is recomputed per request and never stored or logged.

use std::fmt;

use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::ConfigError;

type HmacSha256 = Hmac<Sha256>;

/// Compute the secret hash for a single subject.
///
/// Prefer [`SecretHasher`] on hot paths; it validates and keys the MAC once.
pub fn compute_secret_hash(
    subject: &str,
    client_id: &str,
    secret_key: &[u8],
) -> Result<String, ConfigError> {
    Ok(SecretHasher::new(client_id, secret_key)?.hash(subject))
}

/// Keyed secret-hash generator bound to one app client.
#[derive(Clone)]
pub struct SecretHasher {
    client_id: String,
    mac: HmacSha256,
}

impl SecretHasher {
    pub fn new(client_id: impl Into<String>, secret_key: &[u8]) -> Result<Self, ConfigError> {
        let client_id = client_id.into();
        if client_id.is_empty() {
            return Err(ConfigError::EmptyClientId);
        }
        if secret_key.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret_key).map_err(|e| ConfigError::Invalid {
            name: "client secret",
            reason: e.to_string(),
        })?;
        Ok(Self { client_id, mac })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Secret hash for `subject`, standard padded base64 of a 32-byte digest.
    pub fn hash(&self, subject: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(subject.as_bytes());
        mac.update(self.client_id.as_bytes());
        Base64::encode_string(&mac.finalize().into_bytes())
    }

    /// Constant-time check of a presented hash.
    pub fn verify(&self, subject: &str, presented: &str) -> bool {
        let Ok(presented) = Base64::decode_vec(presented) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(subject.as_bytes());
        mac.update(self.client_id.as_bytes());
        mac.verify_slice(&presented).is_ok()
    }
}

impl fmt::Debug for SecretHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretHasher")
            .field("client_id", &self.client_id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
