// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated subjects.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(subject): Auth) -> impl IntoResponse {
//!     // subject is AuthenticatedSubject
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::middleware::bearer_token;
use super::{AuthError, AuthenticatedSubject};
use crate::state::AppState;

/// Extractor for authenticated subjects.
///
/// Behind `require_bearer` it reads the subject the middleware stored;
/// elsewhere it validates the bearer token itself with the shared gate.
pub struct Auth(pub AuthenticatedSubject);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // First check if middleware already set the subject
        if let Some(subject) = parts.extensions.get::<AuthenticatedSubject>().cloned() {
            return Ok(Auth(subject));
        }

        let token = bearer_token(&parts.headers)?;
        let subject = state.gate.validate(token).await?;
        Ok(Auth(subject))
    }
}
