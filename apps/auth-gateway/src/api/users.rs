// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Caller identity endpoint.

use axum::Json;

use crate::auth::{Auth, AuthenticatedSubject};

/// `GET /api/auth/me`: the subject of the presented bearer token.
pub async fn me(Auth(subject): Auth) -> Json<AuthenticatedSubject> {
    Json(subject)
}
