// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Amazon Cognito user pool client.
//!
//! Talks the `application/x-amz-json-1.1` protocol directly: every operation
//! is a `POST /` with an `X-Amz-Target` header naming it. `SignUp` and
//! `ConfirmSignUp` are public operations; `AdminInitiateAuth` is signed with
//! SigV4 using the gateway's AWS credentials.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode,
};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::{
    sigv4::{self, SigningParams},
    AdminAuthRequest, AuthOutcome, CodeDeliveryDetails, ConfirmSignUpRequest, IdentityError,
    IdentityProvider, SessionTokens, SignUpOutcome, SignUpRequest, UserAttribute,
    ADMIN_NO_SRP_AUTH,
};
use crate::config::{AwsCredentials, ConfigError, GatewayConfig};

const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const SIGNING_SERVICE: &str = "cognito-idp";

/// Cognito Identity Provider API client.
#[derive(Clone)]
pub struct CognitoClient {
    endpoint: Url,
    /// `host[:port]` exactly as reqwest will send it.
    host: String,
    region: String,
    credentials: Option<AwsCredentials>,
    http: Client,
}

impl CognitoClient {
    pub fn new(
        endpoint: Url,
        region: impl Into<String>,
        credentials: Option<AwsCredentials>,
        http: Client,
    ) -> Self {
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };
        Self {
            endpoint,
            host,
            region: region.into(),
            credentials,
            http,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(config.idp_timeout)
            .build()
            .map_err(|e| ConfigError::Invalid {
                name: "identity backend HTTP client",
                reason: e.to_string(),
            })?;
        Ok(Self::new(
            config.idp_endpoint.clone(),
            config.region.clone(),
            config.aws_credentials.clone(),
            http,
        ))
    }

    async fn call<B, R>(&self, operation: &str, body: &B, signed: bool) -> Result<R, IdentityError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)
            .map_err(|e| IdentityError::InvalidResponse(format!("failed to encode request: {e}")))?;
        let target = format!("{TARGET_PREFIX}.{operation}");

        let mut request = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header("X-Amz-Target", &target);

        if signed {
            let credentials = self.credentials.as_ref().ok_or_else(|| {
                IdentityError::Unavailable("AWS credentials are not configured".to_string())
            })?;
            let signature = sigv4::sign(
                &SigningParams {
                    access_key_id: &credentials.access_key_id,
                    secret_access_key: credentials.secret_access_key.expose_secret(),
                    session_token: credentials
                        .session_token
                        .as_ref()
                        .map(|t| t.expose_secret()),
                    region: &self.region,
                    service: SIGNING_SERVICE,
                },
                "POST",
                &self.host,
                self.endpoint.path(),
                &[("content-type", JSON_CONTENT_TYPE), ("x-amz-target", target.as_str())],
                &payload,
                Utc::now(),
            )
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

            request = request
                .header("X-Amz-Date", signature.amz_date)
                .header(AUTHORIZATION, signature.authorization);
            if let Some(token) = signature.security_token {
                request = request.header("X-Amz-Security-Token", token);
            }
        }

        debug!(operation, "calling Cognito");
        let response = request.body(payload).send().await.map_err(|e| {
            warn!(operation, error = %e, "Cognito request failed");
            IdentityError::Unavailable(e.to_string())
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        if status.is_success() {
            let bytes: &[u8] = if bytes.is_empty() { b"{}" } else { &bytes };
            return serde_json::from_slice(bytes)
                .map_err(|e| IdentityError::InvalidResponse(e.to_string()));
        }

        let error = parse_error(status, &bytes);
        debug!(operation, %status, kind = ?error.kind(), "Cognito rejected request");
        Err(error)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpBody<'a> {
    client_id: &'a str,
    secret_hash: &'a str,
    username: &'a str,
    password: &'a str,
    user_attributes: &'a [UserAttribute],
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpResponse {
    user_sub: String,
    #[serde(default)]
    user_confirmed: bool,
    #[serde(default)]
    code_delivery_details: Option<CodeDeliveryDetails>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConfirmSignUpBody<'a> {
    client_id: &'a str,
    secret_hash: &'a str,
    username: &'a str,
    confirmation_code: &'a str,
}

#[derive(Deserialize)]
struct EmptyResponse {}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AdminInitiateAuthBody<'a> {
    user_pool_id: &'a str,
    client_id: &'a str,
    auth_flow: &'static str,
    auth_parameters: BTreeMap<&'static str, &'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AdminInitiateAuthResponse {
    #[serde(default)]
    authentication_result: Option<AuthenticationResult>,
    #[serde(default)]
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: Option<String>,
    id_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
}

/// Cognito error payload: `{"__type": "...Exception", "message": "..."}`.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

fn parse_error(status: StatusCode, body: &[u8]) -> IdentityError {
    let parsed: Option<ErrorBody> = serde_json::from_slice(body).ok();
    let (kind, message) = match parsed {
        Some(body) => (
            // Some services prefix the type with a namespace: `ns#NameException`.
            body.kind
                .map(|k| k.rsplit('#').next().unwrap_or(&k).to_string()),
            body.message,
        ),
        None => (None, None),
    };

    if status.is_server_error() {
        return IdentityError::Unavailable(
            message.unwrap_or_else(|| format!("HTTP {status} from identity backend")),
        );
    }

    match kind {
        Some(kind) => {
            let message = message.unwrap_or_else(|| kind.clone());
            IdentityError::Rejected { kind, message }
        }
        None if status == StatusCode::TOO_MANY_REQUESTS => {
            IdentityError::Unavailable(format!("HTTP {status} from identity backend"))
        }
        None => IdentityError::InvalidResponse(format!("HTTP {status} without error payload")),
    }
}

#[async_trait]
impl IdentityProvider for CognitoClient {
    async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpOutcome, IdentityError> {
        let body = SignUpBody {
            client_id: &request.client_id,
            secret_hash: &request.secret_hash,
            username: &request.username,
            password: request.password.expose_secret(),
            user_attributes: &request.attributes,
        };
        let response: SignUpResponse = self.call("SignUp", &body, false).await?;
        Ok(SignUpOutcome {
            user_sub: response.user_sub,
            user_confirmed: response.user_confirmed,
            code_delivery: response.code_delivery_details,
        })
    }

    async fn confirm_sign_up(&self, request: ConfirmSignUpRequest) -> Result<(), IdentityError> {
        let body = ConfirmSignUpBody {
            client_id: &request.client_id,
            secret_hash: &request.secret_hash,
            username: &request.username,
            confirmation_code: &request.confirmation_code,
        };
        let _: EmptyResponse = self.call("ConfirmSignUp", &body, false).await?;
        Ok(())
    }

    async fn admin_initiate_auth(
        &self,
        request: AdminAuthRequest,
    ) -> Result<AuthOutcome, IdentityError> {
        let body = AdminInitiateAuthBody {
            user_pool_id: &request.user_pool_id,
            client_id: &request.client_id,
            auth_flow: ADMIN_NO_SRP_AUTH,
            auth_parameters: BTreeMap::from([
                ("USERNAME", request.username.as_str()),
                ("PASSWORD", request.password.expose_secret()),
                ("SECRET_HASH", request.secret_hash.as_str()),
            ]),
        };
        let response: AdminInitiateAuthResponse =
            self.call("AdminInitiateAuth", &body, true).await?;

        match (response.authentication_result, response.challenge_name) {
            (
                Some(AuthenticationResult {
                    access_token: Some(access_token),
                    id_token: Some(id_token),
                    refresh_token: Some(refresh_token),
                    expires_in,
                    token_type,
                }),
                _,
            ) => Ok(AuthOutcome::Authenticated(SessionTokens {
                access_token,
                id_token,
                refresh_token,
                expires_in,
                token_type,
            })),
            (_, Some(name)) => Ok(AuthOutcome::Challenge { name }),
            _ => Err(IdentityError::InvalidResponse(
                "authentication result is incomplete".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, header, header_exists, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn client_for(server: &MockServer) -> CognitoClient {
        CognitoClient::new(
            Url::parse(&format!("{}/", server.uri())).unwrap(),
            "eu-west-1",
            Some(AwsCredentials {
                access_key_id: "AKIDEXAMPLE".to_string(),
                secret_access_key: SecretString::from("aws-secret".to_string()),
                session_token: None,
            }),
            Client::new(),
        )
    }

    #[tokio::test]
    async fn sign_up_sends_target_and_parses_receipt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-amz-target", "AWSCognitoIdentityProviderService.SignUp"))
            .and(header("content-type", JSON_CONTENT_TYPE))
            .and(body_partial_json(json!({
                "ClientId": "client-123",
                "SecretHash": "hash",
                "Username": "alice@example.com",
                "Password": "Passw0rd!",
                "UserAttributes": [{"Name": "email", "Value": "alice@example.com"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "UserSub": "sub-1",
                "UserConfirmed": false,
                "CodeDeliveryDetails": {
                    "Destination": "a***@e***",
                    "DeliveryMedium": "EMAIL",
                    "AttributeName": "email"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .sign_up(SignUpRequest {
                client_id: "client-123".into(),
                secret_hash: "hash".into(),
                username: "alice@example.com".into(),
                password: SecretString::from("Passw0rd!".to_string()),
                attributes: vec![UserAttribute::new("email", "alice@example.com")],
            })
            .await
            .expect("sign up succeeds");

        assert_eq!(outcome.user_sub, "sub-1");
        assert!(!outcome.user_confirmed);
        assert_eq!(
            outcome.code_delivery.and_then(|d| d.delivery_medium).as_deref(),
            Some("EMAIL")
        );
    }

    #[tokio::test]
    async fn sign_up_surfaces_backend_message_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "__type": "UsernameExistsException",
                "message": "User already exists"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .sign_up(SignUpRequest {
                client_id: "client-123".into(),
                secret_hash: "hash".into(),
                username: "alice@example.com".into(),
                password: SecretString::from("Passw0rd!".to_string()),
                attributes: vec![],
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), Some("UsernameExistsException"));
        assert_eq!(err.to_string(), "User already exists");
    }

    #[tokio::test]
    async fn confirm_sign_up_accepts_empty_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header(
                "x-amz-target",
                "AWSCognitoIdentityProviderService.ConfirmSignUp",
            ))
            .and(body_partial_json(json!({"ConfirmationCode": "123456"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        client_for(&server)
            .confirm_sign_up(ConfirmSignUpRequest {
                client_id: "client-123".into(),
                secret_hash: "hash".into(),
                username: "alice@example.com".into(),
                confirmation_code: "123456".into(),
            })
            .await
            .expect("confirmation succeeds");
    }

    #[tokio::test]
    async fn admin_initiate_auth_is_signed_and_returns_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header(
                "x-amz-target",
                "AWSCognitoIdentityProviderService.AdminInitiateAuth",
            ))
            .and(header_exists("authorization"))
            .and(header_exists("x-amz-date"))
            .and(body_partial_json(json!({
                "UserPoolId": "pool",
                "AuthFlow": "ADMIN_NO_SRP_AUTH",
                "AuthParameters": {
                    "USERNAME": "alice@example.com",
                    "PASSWORD": "Passw0rd!",
                    "SECRET_HASH": "hash"
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "AuthenticationResult": {
                    "AccessToken": "access",
                    "IdToken": "id",
                    "RefreshToken": "refresh",
                    "ExpiresIn": 3600,
                    "TokenType": "Bearer"
                },
                "ChallengeParameters": {}
            })))
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .admin_initiate_auth(AdminAuthRequest {
                user_pool_id: "pool".into(),
                client_id: "client-123".into(),
                username: "alice@example.com".into(),
                password: SecretString::from("Passw0rd!".to_string()),
                secret_hash: "hash".into(),
            })
            .await
            .expect("auth succeeds");

        let tokens = match outcome {
            AuthOutcome::Authenticated(tokens) => tokens,
            other => panic!("expected tokens, got {other:?}"),
        };
        assert_eq!(tokens.access_token, "access");
        assert_eq!(tokens.id_token, "id");
        assert_eq!(tokens.refresh_token, "refresh");
        assert_eq!(tokens.expires_in, Some(3600));
    }

    #[tokio::test]
    async fn admin_initiate_auth_reports_challenge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ChallengeName": "NEW_PASSWORD_REQUIRED",
                "Session": "opaque"
            })))
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .admin_initiate_auth(AdminAuthRequest {
                user_pool_id: "pool".into(),
                client_id: "client-123".into(),
                username: "alice@example.com".into(),
                password: SecretString::from("Passw0rd!".to_string()),
                secret_hash: "hash".into(),
            })
            .await
            .expect("challenge is not an error at this layer");

        assert_eq!(
            outcome,
            AuthOutcome::Challenge {
                name: "NEW_PASSWORD_REQUIRED".into()
            }
        );
    }

    #[tokio::test]
    async fn admin_initiate_auth_without_credentials_fails_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = CognitoClient::new(
            Url::parse(&format!("{}/", server.uri())).unwrap(),
            "eu-west-1",
            None,
            Client::new(),
        );
        let err = client
            .admin_initiate_auth(AdminAuthRequest {
                user_pool_id: "pool".into(),
                client_id: "client-123".into(),
                username: "alice@example.com".into(),
                password: SecretString::from("Passw0rd!".to_string()),
                secret_hash: "hash".into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, IdentityError::Unavailable(_)));
    }

    #[test]
    fn parse_error_strips_namespace_and_reads_capitalised_message() {
        let err = parse_error(
            StatusCode::BAD_REQUEST,
            br#"{"__type":"com.amazonaws.cognito#NotAuthorizedException","Message":"Incorrect username or password."}"#,
        );
        assert_eq!(err.kind(), Some("NotAuthorizedException"));
        assert_eq!(err.to_string(), "Incorrect username or password.");
    }

    #[test]
    fn parse_error_treats_5xx_as_unavailable() {
        let err = parse_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            br#"{"__type":"InternalErrorException","message":"boom"}"#,
        );
        assert!(matches!(err, IdentityError::Unavailable(ref m) if m == "boom"));
    }

    #[test]
    fn parse_error_without_payload_is_invalid_response() {
        let err = parse_error(StatusCode::BAD_REQUEST, b"<html>");
        assert!(matches!(err, IdentityError::InvalidResponse(_)));
    }
}
