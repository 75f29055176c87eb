// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer token validation for protected routes.
//!
//! ## Auth Flow
//!
//! 1. Caller logs in through `/api/auth/login` and receives Cognito tokens
//! 2. Caller sends `Authorization: Bearer <ID or access token>`
//! 3. Gateway:
//!    - Fetches the user pool JWKS via HTTPS (or uses the shared HS256 key)
//!    - Verifies JWT signature, expiry, issuer
//!    - Checks the token was issued for this app client (`aud`, or
//!      `client_id` for access tokens)
//!    - Extracts `sub`, username, email and `cognito:groups`
//!
//! ## Security
//!
//! - Health endpoints are the only unauthenticated routes besides the
//!   credential flow itself
//! - JWKS is cached with TTL for performance
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod middleware;

pub use claims::{AuthenticatedSubject, CognitoClaims};
pub use error::AuthError;
pub use extractor::Auth;
pub use jwks::JwksManager;
pub use middleware::{require_bearer, BearerGate, KeySource};
