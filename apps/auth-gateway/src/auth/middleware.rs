// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer validation gate.
//!
//! [`BearerGate`] holds the validation parameters, built once at startup:
//! the signing keys (user pool JWKS, or a shared HS256 secret), the expected
//! issuer and the app client id. [`require_bearer`] applies it to a router
//! subtree; a request it refuses never reaches the handler.
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/api/auth/me", get(me))
//!     .route_layer(axum::middleware::from_fn_with_state(gate, require_bearer));
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use super::jwks::JwksManager;
use super::{claims::CognitoClaims, AuthError, AuthenticatedSubject};
use crate::config::{ConfigError, GatewayConfig};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Where token signing keys come from.
#[derive(Clone)]
pub enum KeySource {
    /// User pool JWKS (RS256 in practice).
    Jwks(JwksManager),
    /// Shared HS256 secret (in-memory backend, local development).
    Shared(DecodingKey),
}

/// Validates bearer tokens against one issuer and one app client.
#[derive(Clone)]
pub struct BearerGate {
    keys: KeySource,
    issuer: String,
    client_id: String,
    validation: Validation,
}

impl BearerGate {
    pub fn new(keys: KeySource, issuer: impl Into<String>, client_id: impl Into<String>) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.validate_nbf = true;
        validation.set_issuer(&[&issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // Access tokens have no `aud`; the client binding is checked on the
        // decoded claims instead.
        validation.validate_aud = false;

        Self {
            keys,
            issuer,
            client_id: client_id.into(),
            validation,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let keys = match &config.token_signing_secret {
            Some(secret) => {
                KeySource::Shared(DecodingKey::from_secret(secret.expose_secret().as_bytes()))
            }
            None => {
                let http = reqwest::Client::builder()
                    .timeout(config.idp_timeout)
                    .build()
                    .map_err(|e| ConfigError::Invalid {
                        name: "JWKS HTTP client",
                        reason: e.to_string(),
                    })?;
                KeySource::Jwks(JwksManager::new(config.jwks_url.clone(), http))
            }
        };
        Ok(Self::new(keys, config.issuer.clone(), config.client_id.clone()))
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The JWKS manager, when keys come from the user pool.
    pub fn jwks(&self) -> Option<&JwksManager> {
        match &self.keys {
            KeySource::Jwks(jwks) => Some(jwks),
            KeySource::Shared(_) => None,
        }
    }

    /// Verify signature, expiry, issuer and client binding of `token`.
    pub async fn validate(&self, token: &str) -> Result<AuthenticatedSubject, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;

        let (decoding_key, algorithm) = match &self.keys {
            KeySource::Jwks(jwks) => match &header.kid {
                Some(kid) => jwks.get_decoding_key(kid).await?,
                None => jwks.get_any_decoding_key().await?,
            },
            KeySource::Shared(key) => (key.clone(), Algorithm::HS256),
        };

        let mut validation = self.validation.clone();
        validation.algorithms = vec![algorithm];

        let claims = decode::<CognitoClaims>(token, &decoding_key, &validation)?.claims;
        if !claims.is_for_client(&self.client_id) {
            return Err(AuthError::InvalidAudience);
        }

        Ok(AuthenticatedSubject::from_claims(claims))
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::InvalidAuthHeader)?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(AuthError::InvalidAuthHeader);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

/// Authentication middleware function.
///
/// On success the [`AuthenticatedSubject`] is inserted into the request
/// extensions for the `Auth` extractor.
pub async fn require_bearer(
    State(gate): State<Arc<BearerGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(request.headers()) {
        Ok(token) => token,
        Err(e) => {
            debug!(error_code = e.error_code(), "request without usable bearer token");
            return e.into_response();
        }
    };

    match gate.validate(token).await {
        Ok(subject) => {
            debug!(subject = %subject.subject, "bearer token accepted");
            request.extensions_mut().insert(subject);
            next.run(request).await
        }
        Err(e) => {
            warn!(error_code = e.error_code(), error = %e, "bearer token rejected");
            e.into_response()
        }
    }
}
