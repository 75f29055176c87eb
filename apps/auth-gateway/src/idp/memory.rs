// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-local identity backend.
//!
//! Behaves like a Cognito user pool with one app client: it verifies the
//! secret hash, issues six-digit confirmation codes, enforces the
//! `Unconfirmed` → `Confirmed` lifecycle and mints HS256 tokens with the
//! same claims Cognito puts in ID and access tokens. Rejections use
//! Cognito's exception names and messages.
//!
//! Nothing survives a restart. Codes are "delivered" to the log.

use std::collections::HashMap;

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::{Rng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    AdminAuthRequest, AuthOutcome, CodeDeliveryDetails, ConfirmSignUpRequest, IdentityError,
    IdentityProvider, SessionTokens, SignUpOutcome, SignUpRequest, UserAttribute,
};
use crate::auth::CognitoClaims;
use crate::config::{ConfigError, GatewayConfig};
use crate::models::RegistrationState;
use crate::secret_hash::SecretHasher;

const MIN_PASSWORD_LEN: usize = 8;
const TOKEN_TTL_SECS: i64 = 3600;
const ACCESS_SCOPE: &str = "aws.cognito.signin.user.admin";

/// Key id stamped into minted token headers.
pub const MEMORY_KEY_ID: &str = "memory";

struct Account {
    sub: String,
    password: SecretString,
    attributes: Vec<UserAttribute>,
    state: RegistrationState,
    confirmation_code: String,
}

impl Account {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

pub struct InMemoryIdentityProvider {
    user_pool_id: String,
    hasher: SecretHasher,
    issuer: String,
    signing_key: EncodingKey,
    accounts: RwLock<HashMap<String, Account>>,
}

impl InMemoryIdentityProvider {
    pub fn new(
        user_pool_id: impl Into<String>,
        hasher: SecretHasher,
        issuer: impl Into<String>,
        token_signing_secret: &[u8],
    ) -> Result<Self, ConfigError> {
        if token_signing_secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        Ok(Self {
            user_pool_id: user_pool_id.into(),
            hasher,
            issuer: issuer.into(),
            signing_key: EncodingKey::from_secret(token_signing_secret),
            accounts: RwLock::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let signing_secret = config
            .token_signing_secret
            .as_ref()
            .ok_or(ConfigError::Missing(crate::config::TOKEN_SIGNING_SECRET_ENV))?;
        Self::new(
            config.user_pool_id.clone(),
            SecretHasher::new(config.client_id.clone(), config.client_secret_bytes())?,
            config.issuer.clone(),
            signing_secret.expose_secret().as_bytes(),
        )
    }

    /// Confirmation code waiting for `username`, if it is still unconfirmed.
    pub async fn pending_code(&self, username: &str) -> Option<String> {
        let accounts = self.accounts.read().await;
        accounts
            .get(username)
            .filter(|a| a.state == RegistrationState::Unconfirmed)
            .map(|a| a.confirmation_code.clone())
    }

    pub async fn state_of(&self, username: &str) -> Option<RegistrationState> {
        self.accounts.read().await.get(username).map(|a| a.state)
    }

    pub async fn attribute(&self, username: &str, name: &str) -> Option<String> {
        let accounts = self.accounts.read().await;
        accounts
            .get(username)
            .and_then(|a| a.attribute(name))
            .map(str::to_string)
    }

    fn check_client(
        &self,
        client_id: &str,
        username: &str,
        secret_hash: &str,
    ) -> Result<(), IdentityError> {
        if client_id != self.hasher.client_id() {
            return Err(IdentityError::rejected(
                "ResourceNotFoundException",
                format!("User pool client {client_id} does not exist."),
            ));
        }
        if !self.hasher.verify(username, secret_hash) {
            return Err(IdentityError::rejected(
                "NotAuthorizedException",
                format!("Unable to verify secret hash for client {client_id}"),
            ));
        }
        Ok(())
    }

    fn mint_tokens(&self, username: &str, account: &Account) -> Result<SessionTokens, IdentityError> {
        let now = Utc::now();
        let exp = (now + Duration::seconds(TOKEN_TTL_SECS)).timestamp();
        let client_id = self.hasher.client_id().to_string();

        let id_claims = CognitoClaims {
            sub: account.sub.clone(),
            iss: self.issuer.clone(),
            exp,
            iat: now.timestamp(),
            aud: Some(json!(client_id)),
            token_use: Some("id".to_string()),
            cognito_username: Some(username.to_string()),
            email: account.attribute("email").map(str::to_string),
            auth_time: Some(now.timestamp()),
            ..Default::default()
        };
        let access_claims = CognitoClaims {
            sub: account.sub.clone(),
            iss: self.issuer.clone(),
            exp,
            iat: now.timestamp(),
            client_id: Some(client_id),
            token_use: Some("access".to_string()),
            username: Some(username.to_string()),
            scope: Some(ACCESS_SCOPE.to_string()),
            auth_time: Some(now.timestamp()),
            jti: Some(Uuid::new_v4().to_string()),
            ..Default::default()
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(MEMORY_KEY_ID.to_string());

        let sign = |claims: &CognitoClaims| {
            encode(&header, claims, &self.signing_key)
                .map_err(|e| IdentityError::Unavailable(format!("token signing failed: {e}")))
        };

        let mut refresh = [0u8; 48];
        rand::thread_rng().fill_bytes(&mut refresh);

        Ok(SessionTokens {
            access_token: sign(&access_claims)?,
            id_token: sign(&id_claims)?,
            refresh_token: Base64UrlUnpadded::encode_string(&refresh),
            expires_in: Some(TOKEN_TTL_SECS),
            token_type: Some("Bearer".to_string()),
        })
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpOutcome, IdentityError> {
        self.check_client(&request.client_id, &request.username, &request.secret_hash)?;

        if request.password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
            return Err(IdentityError::rejected(
                "InvalidPasswordException",
                "Password did not conform with policy: Password not long enough",
            ));
        }

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&request.username) {
            return Err(IdentityError::rejected(
                "UsernameExistsException",
                "User already exists",
            ));
        }

        let sub = Uuid::new_v4().to_string();
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32));
        let destination = request
            .attributes
            .iter()
            .find(|a| a.name == "email")
            .map(|a| mask_email(&a.value));

        debug!(username = %request.username, code = %code, "confirmation code issued (in-memory delivery)");

        accounts.insert(
            request.username,
            Account {
                sub: sub.clone(),
                password: request.password,
                attributes: request.attributes,
                state: RegistrationState::Unconfirmed,
                confirmation_code: code,
            },
        );

        Ok(SignUpOutcome {
            user_sub: sub,
            user_confirmed: false,
            code_delivery: destination.map(|destination| CodeDeliveryDetails {
                destination: Some(destination),
                delivery_medium: Some("EMAIL".to_string()),
                attribute_name: Some("email".to_string()),
            }),
        })
    }

    async fn confirm_sign_up(&self, request: ConfirmSignUpRequest) -> Result<(), IdentityError> {
        self.check_client(&request.client_id, &request.username, &request.secret_hash)?;

        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&request.username).ok_or_else(|| {
            IdentityError::rejected(
                "UserNotFoundException",
                "Username/client id combination not found.",
            )
        })?;

        if account.state == RegistrationState::Confirmed {
            return Err(IdentityError::rejected(
                "NotAuthorizedException",
                "User cannot be confirmed. Current status is CONFIRMED",
            ));
        }
        if account.confirmation_code != request.confirmation_code {
            return Err(IdentityError::rejected(
                "CodeMismatchException",
                "Invalid verification code provided, please try again.",
            ));
        }

        account.state = RegistrationState::Confirmed;
        debug!(username = %request.username, "account confirmed");
        Ok(())
    }

    async fn admin_initiate_auth(
        &self,
        request: AdminAuthRequest,
    ) -> Result<AuthOutcome, IdentityError> {
        if request.user_pool_id != self.user_pool_id {
            return Err(IdentityError::rejected(
                "ResourceNotFoundException",
                format!("User pool {} does not exist.", request.user_pool_id),
            ));
        }
        self.check_client(&request.client_id, &request.username, &request.secret_hash)?;

        let accounts = self.accounts.read().await;
        let account = accounts.get(&request.username).ok_or_else(|| {
            IdentityError::rejected("UserNotFoundException", "User does not exist.")
        })?;

        if account.password.expose_secret() != request.password.expose_secret() {
            return Err(IdentityError::rejected(
                "NotAuthorizedException",
                "Incorrect username or password.",
            ));
        }
        if account.state != RegistrationState::Confirmed {
            return Err(IdentityError::rejected(
                "UserNotConfirmedException",
                "User is not confirmed.",
            ));
        }

        self.mint_tokens(&request.username, account)
            .map(AuthOutcome::Authenticated)
    }
}

/// `alice@example.com` → `a***@e***`
fn mask_email(email: &str) -> String {
    let (local, domain) = email.split_once('@').unwrap_or((email, ""));
    let first = |s: &str| s.chars().next().map(String::from).unwrap_or_default();
    format!("{}***@{}***", first(local), first(domain))
}
