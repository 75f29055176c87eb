// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Auth Gateway - Cognito-backed credential gateway
//!
//! Registers, confirms and logs in users against an Amazon Cognito user
//! pool whose app client has a secret, and validates the bearer tokens the
//! pool issues.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Bearer token validation (JWKS / shared key)
//! - `flow` - Register / confirm / login orchestration
//! - `idp` - Identity backends (Cognito JSON API, in-memory)
//! - `secret_hash` - Per-subject `SECRET_HASH` computation

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod flow;
pub mod idp;
pub mod models;
pub mod secret_hash;
pub mod state;
pub mod telemetry;
