// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment exactly once at startup into an
//! immutable [`GatewayConfig`], which is then shared through `AppState`.
//! Any error here is fatal: the gateway refuses to serve traffic.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AWS_REGION` | Region of the Cognito user pool | Required |
//! | `COGNITO_USER_POOL_ID` | User pool identifier | Required |
//! | `COGNITO_APP_CLIENT_ID` | App client identifier (token audience) | Required |
//! | `COGNITO_APP_CLIENT_SECRET` | App client secret used for the secret hash | Required |
//! | `COGNITO_ISSUER` | Expected JWT issuer | `https://cognito-idp.{region}.amazonaws.com/{pool}` |
//! | `COGNITO_JWKS_URL` | JWKS endpoint | `{issuer}/.well-known/jwks.json` |
//! | `COGNITO_ENDPOINT` | Cognito API endpoint | `https://cognito-idp.{region}.amazonaws.com/` |
//! | `AWS_ACCESS_KEY_ID` | Credentials for admin calls | Required for `cognito` backend |
//! | `AWS_SECRET_ACCESS_KEY` | Credentials for admin calls | Required for `cognito` backend |
//! | `AWS_SESSION_TOKEN` | Temporary session token | Optional |
//! | `IDENTITY_BACKEND` | `cognito` or `memory` | `cognito` |
//! | `TOKEN_SIGNING_SECRET` | Shared HS256 key for bearer validation | Required for `memory` backend |
//! | `IDP_TIMEOUT_SECS` | Backend HTTP timeout | `10` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate chain and key | Plain HTTP when unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

pub const AWS_REGION_ENV: &str = "AWS_REGION";
pub const USER_POOL_ID_ENV: &str = "COGNITO_USER_POOL_ID";
pub const APP_CLIENT_ID_ENV: &str = "COGNITO_APP_CLIENT_ID";
pub const APP_CLIENT_SECRET_ENV: &str = "COGNITO_APP_CLIENT_SECRET";
pub const ISSUER_ENV: &str = "COGNITO_ISSUER";
pub const JWKS_URL_ENV: &str = "COGNITO_JWKS_URL";
pub const ENDPOINT_ENV: &str = "COGNITO_ENDPOINT";
pub const AWS_ACCESS_KEY_ID_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_SESSION_TOKEN_ENV: &str = "AWS_SESSION_TOKEN";
pub const IDENTITY_BACKEND_ENV: &str = "IDENTITY_BACKEND";
pub const TOKEN_SIGNING_SECRET_ENV: &str = "TOKEN_SIGNING_SECRET";
pub const IDP_TIMEOUT_ENV: &str = "IDP_TIMEOUT_SECS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_IDP_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration errors. All of them prevent startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required configuration {0} is not set")]
    Missing(&'static str),

    #[error("configuration {0} must not be empty")]
    Empty(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("secret key must not be empty")]
    EmptySecret,

    #[error("client id must not be empty")]
    EmptyClientId,
}

/// Which identity backend the credential flow talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Amazon Cognito over its JSON API.
    Cognito,
    /// Process-local backend for development and tests.
    Memory,
}

impl BackendKind {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "cognito" => Ok(Self::Cognito),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Invalid {
                name: IDENTITY_BACKEND_ENV,
                reason: format!("unknown backend '{other}' (expected 'cognito' or 'memory')"),
            }),
        }
    }
}

/// AWS credentials used to SigV4-sign administrative Cognito calls.
#[derive(Debug)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: Option<SecretString>,
}

impl Clone for AwsCredentials {
    fn clone(&self) -> Self {
        Self {
            access_key_id: self.access_key_id.clone(),
            secret_access_key: SecretString::from(
                self.secret_access_key.expose_secret().to_owned(),
            ),
            session_token: self
                .session_token
                .as_ref()
                .map(|t| SecretString::from(t.expose_secret().to_owned())),
        }
    }
}

/// PEM files for serving HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Process-wide gateway configuration, immutable after startup.
#[derive(Debug)]
pub struct GatewayConfig {
    pub region: String,
    pub user_pool_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Expected `iss` claim of inbound bearer tokens.
    pub issuer: String,
    pub jwks_url: String,
    pub idp_endpoint: Url,
    pub backend: BackendKind,
    pub aws_credentials: Option<AwsCredentials>,
    /// When set, bearer tokens are verified with this HS256 key instead of JWKS.
    pub token_signing_secret: Option<SecretString>,
    pub idp_timeout: Duration,
    pub bind_addr: SocketAddr,
    pub tls: Option<TlsPaths>,
}

/// Issuer URL Cognito stamps into tokens for a user pool.
pub fn cognito_issuer(region: &str, user_pool_id: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}")
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let region = required(&lookup, AWS_REGION_ENV)?;
        let user_pool_id = required(&lookup, USER_POOL_ID_ENV)?;
        let client_id = required(&lookup, APP_CLIENT_ID_ENV)?;
        let client_secret = required_secret(&lookup, APP_CLIENT_SECRET_ENV)?;

        let issuer = optional(&lookup, ISSUER_ENV)
            .unwrap_or_else(|| cognito_issuer(&region, &user_pool_id))
            .trim_end_matches('/')
            .to_string();
        let jwks_url = optional(&lookup, JWKS_URL_ENV)
            .unwrap_or_else(|| format!("{issuer}/.well-known/jwks.json"));

        let endpoint = optional(&lookup, ENDPOINT_ENV)
            .unwrap_or_else(|| format!("https://cognito-idp.{region}.amazonaws.com/"));
        let idp_endpoint = Url::parse(&endpoint).map_err(|e| ConfigError::Invalid {
            name: ENDPOINT_ENV,
            reason: e.to_string(),
        })?;

        let backend = match optional(&lookup, IDENTITY_BACKEND_ENV) {
            Some(value) => BackendKind::parse(&value)?,
            None => BackendKind::Cognito,
        };

        let aws_credentials = match backend {
            BackendKind::Cognito => Some(AwsCredentials {
                access_key_id: required(&lookup, AWS_ACCESS_KEY_ID_ENV)?,
                secret_access_key: required_secret(&lookup, AWS_SECRET_ACCESS_KEY_ENV)?,
                session_token: optional(&lookup, AWS_SESSION_TOKEN_ENV).map(SecretString::from),
            }),
            BackendKind::Memory => None,
        };

        let token_signing_secret = match backend {
            BackendKind::Memory => Some(required_secret(&lookup, TOKEN_SIGNING_SECRET_ENV)?),
            BackendKind::Cognito => lookup(TOKEN_SIGNING_SECRET_ENV)
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
        };

        let idp_timeout = match optional(&lookup, IDP_TIMEOUT_ENV) {
            Some(value) => Duration::from_secs(value.parse().map_err(|_| {
                ConfigError::Invalid {
                    name: IDP_TIMEOUT_ENV,
                    reason: format!("'{value}' is not a number of seconds"),
                }
            })?),
            None => DEFAULT_IDP_TIMEOUT,
        };

        let host = optional(&lookup, HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match optional(&lookup, PORT_ENV) {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: PORT_ENV,
                reason: format!("'{value}' is not a valid port"),
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|_| ConfigError::Invalid {
                    name: HOST_ENV,
                    reason: format!("'{host}' is not a valid bind address"),
                })?;

        let tls = match (
            optional(&lookup, TLS_CERT_PATH_ENV),
            optional(&lookup, TLS_KEY_PATH_ENV),
        ) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        Ok(Self {
            region,
            user_pool_id,
            client_id,
            client_secret,
            issuer,
            jwks_url,
            idp_endpoint,
            backend,
            aws_credentials,
            token_signing_secret,
            idp_timeout,
            bind_addr,
            tls,
        })
    }

    /// Raw bytes of the app client secret.
    pub fn client_secret_bytes(&self) -> &[u8] {
        self.client_secret.expose_secret().as_bytes()
    }
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Err(ConfigError::Missing(name)),
        Some(value) if value.trim().is_empty() => Err(ConfigError::Empty(name)),
        Some(value) => Ok(value.trim().to_string()),
    }
}

// Secrets are kept byte-for-byte; only an all-blank value is rejected.
fn required_secret<F>(lookup: &F, name: &'static str) -> Result<SecretString, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Err(ConfigError::Missing(name)),
        Some(value) if value.trim().is_empty() => Err(ConfigError::Empty(name)),
        Some(value) => Ok(SecretString::from(value)),
    }
}

fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
