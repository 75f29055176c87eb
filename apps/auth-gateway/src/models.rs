// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the `/api/auth` endpoints.
//!
//! Response field names follow the identity backend's PascalCase wire format
//! (`UserSub`, `AccessToken`, ...) so that callers see what the backend
//! returned, not a reinterpretation of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::idp::{CodeDeliveryDetails, UserAttribute};

// =============================================================================
// Profile Attributes
// =============================================================================

/// Optional profile attributes supplied at registration.
///
/// The attribute schema belongs to the user pool, so the map is forwarded
/// as-is: strings are sent verbatim, any other JSON value (an `address`
/// object, a number) is sent as its compact JSON text. `null` values are
/// dropped. The `email` attribute always comes from the request's email.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileAttributes(pub BTreeMap<String, Value>);

impl ProfileAttributes {
    pub fn to_user_attributes(&self, email: &str) -> Vec<UserAttribute> {
        let mut attributes = vec![UserAttribute::new("email", email)];
        for (name, value) in &self.0 {
            if name == "email" {
                continue;
            }
            let value = match value {
                Value::Null => continue,
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            attributes.push(UserAttribute::new(name, value));
        }
        attributes
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Body of `POST /api/auth/register`. Any field besides `email` and
/// `password` is treated as a profile attribute.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub attributes: ProfileAttributes,
}

/// Body of `POST /api/auth/confirm-signup`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmRequest {
    pub email: String,
    pub code: String,
}

/// Body of `POST /api/auth/login`.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// =============================================================================
// Responses
// =============================================================================

/// Registration lifecycle of a subject as seen by this gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationState {
    /// Registered, waiting for the confirmation code.
    Unconfirmed,
    /// Confirmation code accepted; the subject can log in.
    Confirmed,
}

impl RegistrationState {
    pub fn from_confirmed(confirmed: bool) -> Self {
        if confirmed {
            Self::Confirmed
        } else {
            Self::Unconfirmed
        }
    }
}

/// Returned by a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistrationReceipt {
    pub user_sub: String,
    pub user_confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_delivery_details: Option<CodeDeliveryDetails>,
    pub state: RegistrationState,
}

/// Returned by a successful confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfirmationReceipt {
    pub username: String,
    pub state: RegistrationState,
}
