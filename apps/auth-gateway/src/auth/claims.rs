// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated subject representation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Claims carried by Cognito-issued tokens.
///
/// ID tokens carry the app client in `aud`; access tokens carry it in
/// `client_id` and have no `aud` at all. `token_use` tells them apart.
/// See: https://docs.aws.amazon.com/cognito/latest/developerguide/amazon-cognito-user-pools-using-tokens-verifying-a-jwt.html
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CognitoClaims {
    /// Subject (user pool `sub`, stable per user)
    pub sub: String,

    /// Issuer (`https://cognito-idp.{region}.amazonaws.com/{pool}`)
    pub iss: String,

    /// Expiration timestamp
    pub exp: i64,

    /// Issued at timestamp
    #[serde(default)]
    pub iat: i64,

    /// Audience, a string or a list of strings (ID tokens)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Value>,

    /// App client the token was issued to (access tokens)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// `id` or `access`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,

    #[serde(
        rename = "cognito:username",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cognito_username: Option<String>,

    /// Username claim of access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(
        rename = "cognito:groups",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub groups: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl CognitoClaims {
    /// Whether the token was issued for `client_id`.
    ///
    /// Access tokens are matched on `client_id`; anything else must list the
    /// client in `aud`.
    pub fn is_for_client(&self, client_id: &str) -> bool {
        if self.token_use.as_deref() == Some("access") {
            return self.client_id.as_deref() == Some(client_id);
        }
        match &self.aud {
            Some(Value::String(aud)) => aud == client_id,
            Some(Value::Array(auds)) => auds.iter().any(|a| a.as_str() == Some(client_id)),
            _ => false,
        }
    }
}

/// Authenticated subject extracted from a verified bearer token.
///
/// This is the type protected handlers receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedSubject {
    /// User pool `sub`
    pub subject: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    /// Original issuer (used for validation, not serialized)
    #[serde(skip)]
    pub issuer: String,

    /// Token expiration (Unix timestamp, not serialized)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedSubject {
    pub fn from_claims(claims: CognitoClaims) -> Self {
        Self {
            subject: claims.sub,
            username: claims.cognito_username.or(claims.username),
            email: claims.email,
            token_use: claims.token_use,
            groups: claims.groups,
            issuer: claims.iss,
            expires_at: claims.exp,
        }
    }
}
