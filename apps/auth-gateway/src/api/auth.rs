// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential endpoints: register, confirm, login.
//!
//! Successful calls return 200 with the backend's result; any failure is a
//! 400 whose `error` is the backend's message.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::error::ApiError;
use crate::idp::SessionTokens;
use crate::models::{
    ConfirmRequest, ConfirmationReceipt, LoginRequest, RegisterRequest, RegistrationReceipt,
};
use crate::state::AppState;

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegistrationReceipt>, ApiError> {
    let Json(request) = payload?;
    let receipt = state
        .flow
        .register(&request.email, request.password, &request.attributes)
        .await?;
    Ok(Json(receipt))
}

/// `POST /api/auth/confirm-signup`
pub async fn confirm_signup(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<Json<ConfirmationReceipt>, ApiError> {
    let Json(request) = payload?;
    let receipt = state.flow.confirm(&request.email, &request.code).await?;
    Ok(Json(receipt))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<SessionTokens>, ApiError> {
    let Json(request) = payload?;
    let tokens = state.flow.login(&request.email, request.password).await?;
    Ok(Json(tokens))
}
