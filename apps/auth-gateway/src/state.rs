// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::BearerGate;
use crate::config::{BackendKind, ConfigError, GatewayConfig};
use crate::flow::CredentialFlow;
use crate::idp::{CognitoClient, IdentityProvider, InMemoryIdentityProvider};
use crate::secret_hash::SecretHasher;

#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<CredentialFlow>,
    pub gate: Arc<BearerGate>,
    pub backend: BackendKind,
}

impl AppState {
    pub fn new(flow: CredentialFlow, gate: BearerGate, backend: BackendKind) -> Self {
        Self {
            flow: Arc::new(flow),
            gate: Arc::new(gate),
            backend,
        }
    }

    /// Wire the flow and gate for the configured backend.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let hasher = SecretHasher::new(config.client_id.clone(), config.client_secret_bytes())?;
        let idp: Arc<dyn IdentityProvider> = match config.backend {
            BackendKind::Cognito => Arc::new(CognitoClient::from_config(config)?),
            BackendKind::Memory => Arc::new(InMemoryIdentityProvider::from_config(config)?),
        };
        let flow = CredentialFlow::new(idp, hasher, config.user_pool_id.clone());
        let gate = BearerGate::from_config(config)?;
        Ok(Self::new(flow, gate, config.backend))
    }
}

#[cfg(test)]
const TEST_CLIENT_ID: &str = "test-client";
#[cfg(test)]
const TEST_POOL_ID: &str = "eu-west-1_test";
#[cfg(test)]
const TEST_ISSUER: &str = "https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_test";
#[cfg(test)]
const TEST_SIGNING_KEY: &[u8] = b"test-signing-key";

/// State backed by the in-memory provider, sharing one HS256 key between
/// token minting and validation.
#[cfg(test)]
pub fn test_state() -> (AppState, Arc<InMemoryIdentityProvider>) {
    let hasher = test_hasher();
    let idp = Arc::new(
        InMemoryIdentityProvider::new(TEST_POOL_ID, hasher, TEST_ISSUER, TEST_SIGNING_KEY)
            .unwrap(),
    );
    (test_state_with(idp.clone()), idp)
}

/// Same wiring as [`test_state`] around an arbitrary backend.
#[cfg(test)]
pub fn test_state_with(idp: Arc<dyn IdentityProvider>) -> AppState {
    use crate::auth::KeySource;
    use jsonwebtoken::DecodingKey;

    let flow = CredentialFlow::new(idp, test_hasher(), TEST_POOL_ID);
    let gate = BearerGate::new(
        KeySource::Shared(DecodingKey::from_secret(TEST_SIGNING_KEY)),
        TEST_ISSUER,
        TEST_CLIENT_ID,
    );
    AppState::new(flow, gate, BackendKind::Memory)
}

#[cfg(test)]
fn test_hasher() -> SecretHasher {
    SecretHasher::new(TEST_CLIENT_ID, b"test-client-secret").unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn builds_memory_backend_from_config() {
        let vars = HashMap::from([
            ("AWS_REGION", "eu-west-1"),
            ("COGNITO_USER_POOL_ID", "eu-west-1_AbCdEf"),
            ("COGNITO_APP_CLIENT_ID", "client-123"),
            ("COGNITO_APP_CLIENT_SECRET", "shh"),
            ("IDENTITY_BACKEND", "memory"),
            ("TOKEN_SIGNING_SECRET", "signing-key"),
        ]);
        let config =
            GatewayConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();

        let state = AppState::from_config(&config).unwrap();
        assert_eq!(state.backend, BackendKind::Memory);
        assert!(state.gate.jwks().is_none());
        assert_eq!(
            state.gate.issuer(),
            "https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_AbCdEf"
        );
    }

    #[test]
    fn cognito_backend_validates_against_jwks() {
        let vars = HashMap::from([
            ("AWS_REGION", "eu-west-1"),
            ("COGNITO_USER_POOL_ID", "eu-west-1_AbCdEf"),
            ("COGNITO_APP_CLIENT_ID", "client-123"),
            ("COGNITO_APP_CLIENT_SECRET", "shh"),
            ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
            ("AWS_SECRET_ACCESS_KEY", "aws-secret"),
        ]);
        let config =
            GatewayConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();

        let state = AppState::from_config(&config).unwrap();
        assert_eq!(state.backend, BackendKind::Cognito);
        assert_eq!(
            state.gate.jwks().map(|j| j.jwks_url()),
            Some("https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_AbCdEf/.well-known/jwks.json")
        );
    }
}
