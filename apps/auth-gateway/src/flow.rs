// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Credential Flow
//!
//! Registration, confirmation and login against the identity backend.
//!
//! Every operation computes the secret hash for the subject, makes exactly
//! one backend call and maps the outcome. Nothing is stored locally and the
//! subject's lifecycle (`Unconfirmed` → `Confirmed`) is enforced by the
//! backend, not pre-checked here.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use secrecy::SecretString;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::idp::{
    classify_rejection, AdminAuthRequest, AuthOutcome, ConfirmSignUpRequest, IdentityError,
    IdentityProvider, RejectionClass, SessionTokens, SignUpRequest,
};
use crate::models::{
    ConfirmationReceipt, ProfileAttributes, RegistrationReceipt, RegistrationState,
};
use crate::secret_hash::SecretHasher;

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Loose syntactic check; the backend is the authority on addresses.
pub fn valid_email(email: &str) -> bool {
    EMAIL_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(email))
}

/// Caller-facing failure of a credential operation.
///
/// The message is the backend's own wording, passed through untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlowError {
    /// Malformed email, weak password, duplicate user, bad code...
    #[error("{0}")]
    Validation(String),

    /// Wrong password, unconfirmed or unknown subject.
    #[error("{0}")]
    Authentication(String),

    /// The backend could not be reached or answered nonsense.
    #[error("{0}")]
    Unavailable(String),
}

impl From<IdentityError> for FlowError {
    fn from(err: IdentityError) -> Self {
        match &err {
            IdentityError::Rejected { kind, message } => match classify_rejection(kind) {
                RejectionClass::Validation => FlowError::Validation(message.clone()),
                RejectionClass::Authentication => FlowError::Authentication(message.clone()),
                RejectionClass::Unavailable => FlowError::Unavailable(message.clone()),
            },
            IdentityError::Unavailable(_) | IdentityError::InvalidResponse(_) => {
                FlowError::Unavailable(err.to_string())
            }
        }
    }
}

/// Orchestrates the three credential operations.
#[derive(Clone)]
pub struct CredentialFlow {
    idp: Arc<dyn IdentityProvider>,
    hasher: SecretHasher,
    user_pool_id: String,
}

impl CredentialFlow {
    pub fn new(
        idp: Arc<dyn IdentityProvider>,
        hasher: SecretHasher,
        user_pool_id: impl Into<String>,
    ) -> Self {
        Self {
            idp,
            hasher,
            user_pool_id: user_pool_id.into(),
        }
    }

    /// Register a new subject. On success the subject is `Unconfirmed`
    /// unless the backend auto-confirms it.
    #[instrument(skip_all, fields(operation = "register"))]
    pub async fn register(
        &self,
        email: &str,
        password: String,
        attributes: &ProfileAttributes,
    ) -> Result<RegistrationReceipt, FlowError> {
        let email = email.trim();
        if !valid_email(email) {
            return Err(FlowError::Validation("Invalid email address".to_string()));
        }

        let outcome = self
            .idp
            .sign_up(SignUpRequest {
                client_id: self.hasher.client_id().to_string(),
                secret_hash: self.hasher.hash(email),
                username: email.to_string(),
                password: SecretString::from(password),
                attributes: attributes.to_user_attributes(email),
            })
            .await
            .map_err(|e| rejected("register", e))?;

        info!(
            user_sub = %outcome.user_sub,
            confirmed = outcome.user_confirmed,
            "registration accepted"
        );

        Ok(RegistrationReceipt {
            user_sub: outcome.user_sub,
            user_confirmed: outcome.user_confirmed,
            code_delivery_details: outcome.code_delivery,
            state: RegistrationState::from_confirmed(outcome.user_confirmed),
        })
    }

    /// Confirm a registration with the out-of-band code.
    #[instrument(skip_all, fields(operation = "confirm"))]
    pub async fn confirm(&self, email: &str, code: &str) -> Result<ConfirmationReceipt, FlowError> {
        let email = email.trim();
        self.idp
            .confirm_sign_up(ConfirmSignUpRequest {
                client_id: self.hasher.client_id().to_string(),
                secret_hash: self.hasher.hash(email),
                username: email.to_string(),
                confirmation_code: code.to_string(),
            })
            .await
            .map_err(|e| rejected("confirm", e))?;

        info!("registration confirmed");
        Ok(ConfirmationReceipt {
            username: email.to_string(),
            state: RegistrationState::Confirmed,
        })
    }

    /// Log in with `ADMIN_NO_SRP_AUTH`. Tokens are returned exactly as issued.
    #[instrument(skip_all, fields(operation = "login"))]
    pub async fn login(&self, email: &str, password: String) -> Result<SessionTokens, FlowError> {
        let email = email.trim();
        let outcome = self
            .idp
            .admin_initiate_auth(AdminAuthRequest {
                user_pool_id: self.user_pool_id.clone(),
                client_id: self.hasher.client_id().to_string(),
                username: email.to_string(),
                password: SecretString::from(password),
                secret_hash: self.hasher.hash(email),
            })
            .await
            .map_err(|e| rejected("login", e))?;

        match outcome {
            AuthOutcome::Authenticated(tokens) => {
                info!("login succeeded");
                Ok(tokens)
            }
            AuthOutcome::Challenge { name } => {
                warn!(challenge = %name, "login requires an unsupported challenge");
                Err(FlowError::Authentication(format!(
                    "Authentication challenge required: {name}"
                )))
            }
        }
    }
}

fn rejected(operation: &'static str, err: IdentityError) -> FlowError {
    warn!(operation, kind = err.kind(), error = %err, "identity backend refused request");
    FlowError::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idp::{ChallengingProvider, InMemoryIdentityProvider};
    use std::collections::BTreeMap;

    const CLIENT_ID: &str = "client-123";
    const CLIENT_SECRET: &[u8] = b"shh";
    const POOL_ID: &str = "eu-west-1_test";

    fn setup() -> (CredentialFlow, Arc<InMemoryIdentityProvider>) {
        let hasher = SecretHasher::new(CLIENT_ID, CLIENT_SECRET).unwrap();
        let idp = Arc::new(
            InMemoryIdentityProvider::new(
                POOL_ID,
                hasher.clone(),
                "https://issuer.test/pool",
                b"token-signing-key",
            )
            .unwrap(),
        );
        let flow = CredentialFlow::new(idp.clone(), hasher, POOL_ID);
        (flow, idp)
    }

    async fn register_and_confirm(flow: &CredentialFlow, idp: &InMemoryIdentityProvider) {
        flow.register("alice@example.com", "Passw0rd!".into(), &ProfileAttributes::default())
            .await
            .expect("registration succeeds");
        let code = idp.pending_code("alice@example.com").await.unwrap();
        flow.confirm("alice@example.com", &code)
            .await
            .expect("confirmation succeeds");
    }

    #[test]
    fn email_check_is_loose() {
        assert!(valid_email("alice@example.com"));
        assert!(valid_email("a.b+c@sub.example.co"));
        assert!(!valid_email("alice"));
        assert!(!valid_email("alice@localhost"));
        assert!(!valid_email("al ice@example.com"));
        assert!(!valid_email(""));
    }

    #[tokio::test]
    async fn register_returns_unconfirmed_receipt() {
        let (flow, idp) = setup();
        let attributes = ProfileAttributes(BTreeMap::from([(
            "name".to_string(),
            serde_json::json!("Alice"),
        )]));

        let receipt = flow
            .register("alice@example.com", "Passw0rd!".into(), &attributes)
            .await
            .unwrap();

        assert_eq!(receipt.state, RegistrationState::Unconfirmed);
        assert!(!receipt.user_confirmed);
        assert!(!receipt.user_sub.is_empty());
        assert_eq!(
            idp.state_of("alice@example.com").await,
            Some(RegistrationState::Unconfirmed)
        );
        assert_eq!(
            idp.attribute("alice@example.com", "name").await.as_deref(),
            Some("Alice")
        );
    }

    #[tokio::test]
    async fn register_rejects_implausible_email_without_backend_call() {
        let (flow, idp) = setup();
        let err = flow
            .register("not-an-email", "Passw0rd!".into(), &ProfileAttributes::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
        assert_eq!(idp.state_of("not-an-email").await, None);
    }

    #[tokio::test]
    async fn registering_twice_fails() {
        let (flow, _idp) = setup();
        flow.register("alice@example.com", "Passw0rd!".into(), &ProfileAttributes::default())
            .await
            .unwrap();

        let err = flow
            .register("alice@example.com", "Passw0rd!".into(), &ProfileAttributes::default())
            .await
            .unwrap_err();
        assert_eq!(err, FlowError::Validation("User already exists".into()));
    }

    #[tokio::test]
    async fn weak_password_message_is_passed_through() {
        let (flow, _idp) = setup();
        let err = flow
            .register("alice@example.com", "short".into(), &ProfileAttributes::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FlowError::Validation(
                "Password did not conform with policy: Password not long enough".into()
            )
        );
    }

    #[tokio::test]
    async fn confirm_then_login_succeeds() {
        let (flow, idp) = setup();
        register_and_confirm(&flow, &idp).await;
        assert_eq!(
            idp.state_of("alice@example.com").await,
            Some(RegistrationState::Confirmed)
        );

        let tokens = flow
            .login("alice@example.com", "Passw0rd!".into())
            .await
            .expect("login succeeds");
        assert!(!tokens.access_token.is_empty());
        assert!(!tokens.id_token.is_empty());
        assert!(!tokens.refresh_token.is_empty());
    }

    #[tokio::test]
    async fn wrong_code_leaves_subject_unconfirmed_and_login_fails() {
        let (flow, idp) = setup();
        flow.register("alice@example.com", "Passw0rd!".into(), &ProfileAttributes::default())
            .await
            .unwrap();
        let code = idp.pending_code("alice@example.com").await.unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let err = flow.confirm("alice@example.com", wrong).await.unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
        assert_eq!(
            idp.state_of("alice@example.com").await,
            Some(RegistrationState::Unconfirmed)
        );

        let err = flow
            .login("alice@example.com", "Passw0rd!".into())
            .await
            .unwrap_err();
        assert_eq!(err, FlowError::Authentication("User is not confirmed.".into()));
    }

    #[tokio::test]
    async fn confirmation_code_is_forwarded_verbatim() {
        let (flow, idp) = setup();
        flow.register("alice@example.com", "Passw0rd!".into(), &ProfileAttributes::default())
            .await
            .unwrap();
        let code = idp.pending_code("alice@example.com").await.unwrap();

        let err = flow
            .confirm("alice@example.com", &format!(" {code} "))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FlowError::Validation("Invalid verification code provided, please try again.".into())
        );
        assert_eq!(
            idp.state_of("alice@example.com").await,
            Some(RegistrationState::Unconfirmed)
        );
    }

    #[tokio::test]
    async fn login_challenge_fails_without_tokens() {
        let hasher = SecretHasher::new(CLIENT_ID, CLIENT_SECRET).unwrap();
        let idp = Arc::new(ChallengingProvider {
            challenge: "NEW_PASSWORD_REQUIRED",
        });
        let flow = CredentialFlow::new(idp, hasher, POOL_ID);

        let err = flow
            .login("alice@example.com", "Passw0rd!".into())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FlowError::Authentication(
                "Authentication challenge required: NEW_PASSWORD_REQUIRED".into()
            )
        );
    }

    #[tokio::test]
    async fn wrong_password_is_an_authentication_error() {
        let (flow, idp) = setup();
        register_and_confirm(&flow, &idp).await;

        let err = flow
            .login("alice@example.com", "wrong-password".into())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FlowError::Authentication("Incorrect username or password.".into())
        );
    }

    #[tokio::test]
    async fn unknown_subject_cannot_log_in() {
        let (flow, _idp) = setup();
        let err = flow
            .login("nobody@example.com", "Passw0rd!".into())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Authentication(_)));
    }

    #[tokio::test]
    async fn mismatched_client_secret_is_refused_by_backend() {
        let (_flow, idp) = setup();
        let wrong_hasher = SecretHasher::new(CLIENT_ID, b"not-the-secret").unwrap();
        let flow = CredentialFlow::new(idp, wrong_hasher, POOL_ID);

        let err = flow
            .register("alice@example.com", "Passw0rd!".into(), &ProfileAttributes::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FlowError::Authentication("Unable to verify secret hash for client client-123".into())
        );
    }

    #[test]
    fn backend_errors_map_to_flow_errors() {
        assert_eq!(
            FlowError::from(IdentityError::rejected(
                "CodeMismatchException",
                "Invalid verification code provided, please try again."
            )),
            FlowError::Validation("Invalid verification code provided, please try again.".into())
        );
        assert_eq!(
            FlowError::from(IdentityError::Unavailable("connection refused".into())),
            FlowError::Unavailable("identity backend unavailable: connection refused".into())
        );
    }
}
