// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Backend
//!
//! The gateway never stores users itself. Every credential operation is a
//! single call to an [`IdentityProvider`]:
//!
//! - `SignUp(ClientId, SecretHash, Username, Password, UserAttributes)`
//! - `ConfirmSignUp(ClientId, SecretHash, Username, ConfirmationCode)`
//! - `AdminInitiateAuth(UserPoolId, ClientId, ADMIN_NO_SRP_AUTH, {USERNAME, PASSWORD, SECRET_HASH})`
//!
//! ## Implementations
//!
//! - [`CognitoClient`] - Amazon Cognito JSON API over HTTPS
//! - [`InMemoryIdentityProvider`] - process-local backend for development and tests

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cognito;
pub mod memory;
pub mod sigv4;

pub use cognito::CognitoClient;
pub use memory::InMemoryIdentityProvider;

/// The only auth flow this gateway drives.
pub const ADMIN_NO_SRP_AUTH: &str = "ADMIN_NO_SRP_AUTH";

/// A single user pool attribute (`Name`/`Value` pair).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserAttribute {
    pub name: String,
    pub value: String,
}

impl UserAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Where the backend sent the confirmation code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodeDeliveryDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_name: Option<String>,
}

#[derive(Debug)]
pub struct SignUpRequest {
    pub client_id: String,
    pub secret_hash: String,
    pub username: String,
    pub password: SecretString,
    pub attributes: Vec<UserAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub user_sub: String,
    pub user_confirmed: bool,
    pub code_delivery: Option<CodeDeliveryDetails>,
}

#[derive(Debug)]
pub struct ConfirmSignUpRequest {
    pub client_id: String,
    pub secret_hash: String,
    pub username: String,
    pub confirmation_code: String,
}

#[derive(Debug)]
pub struct AdminAuthRequest {
    pub user_pool_id: String,
    pub client_id: String,
    pub username: String,
    pub password: SecretString,
    pub secret_hash: String,
}

/// Tokens issued on a successful login. Passed to callers untouched.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionTokens {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

/// Result of `AdminInitiateAuth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(SessionTokens),
    /// The backend wants another round trip (e.g. `NEW_PASSWORD_REQUIRED`).
    Challenge { name: String },
}

/// Errors reported by an identity backend.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// The backend processed the call and refused it. `kind` is the
    /// backend's exception name, `message` its human-readable reason.
    #[error("{message}")]
    Rejected { kind: String, message: String },

    /// Transport failure, timeout, throttling or a 5xx from the backend.
    #[error("identity backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with something we could not interpret.
    #[error("identity backend returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl IdentityError {
    pub fn rejected(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Backend exception name, if the backend reported one.
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Rejected { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// Coarse class of a backend rejection, keyed by exception name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionClass {
    Validation,
    Authentication,
    Unavailable,
}

pub fn classify_rejection(kind: &str) -> RejectionClass {
    match kind {
        "NotAuthorizedException"
        | "UserNotConfirmedException"
        | "UserNotFoundException"
        | "PasswordResetRequiredException" => RejectionClass::Authentication,
        "InternalErrorException"
        | "ServiceUnavailableException"
        | "TooManyRequestsException"
        | "ThrottlingException"
        | "LimitExceededException" => RejectionClass::Unavailable,
        _ => RejectionClass::Validation,
    }
}

/// Identity backend contract consumed by the credential flow.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpOutcome, IdentityError>;

    async fn confirm_sign_up(&self, request: ConfirmSignUpRequest) -> Result<(), IdentityError>;

    async fn admin_initiate_auth(
        &self,
        request: AdminAuthRequest,
    ) -> Result<AuthOutcome, IdentityError>;
}

/// Answers every login with `challenge` instead of tokens.
#[cfg(test)]
pub struct ChallengingProvider {
    pub challenge: &'static str,
}

#[cfg(test)]
#[async_trait]
impl IdentityProvider for ChallengingProvider {
    async fn sign_up(&self, _request: SignUpRequest) -> Result<SignUpOutcome, IdentityError> {
        Err(IdentityError::Unavailable("sign-up not supported".into()))
    }

    async fn confirm_sign_up(&self, _request: ConfirmSignUpRequest) -> Result<(), IdentityError> {
        Err(IdentityError::Unavailable("confirmation not supported".into()))
    }

    async fn admin_initiate_auth(
        &self,
        _request: AdminAuthRequest,
    ) -> Result<AuthOutcome, IdentityError> {
        Ok(AuthOutcome::Challenge {
            name: self.challenge.to_string(),
        })
    }
}
