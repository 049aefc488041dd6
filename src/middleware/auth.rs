// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API token authentication middleware.

use crate::error::AppError;
use crate::models::User;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// The user the dashboard API acts for.
#[derive(Debug, Clone)]
pub struct PrimaryUser(pub User);

/// Whether `header_value` is `Bearer <expected>`, compared in constant time.
fn bearer_matches(header_value: Option<&str>, expected: &str) -> bool {
    match header_value.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token.as_bytes().ct_eq(expected.as_bytes()).into(),
        None => false,
    }
}

/// Middleware for `/api/*`.
///
/// Checks the bearer token when `API_TOKEN` is configured, then resolves the
/// primary user and inserts it as a request extension.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = &state.config.api_token {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        if !bearer_matches(auth_header, expected) {
            return Err(AppError::Unauthorized);
        }
    }

    let email = &state.config.primary_user_email;
    let user = state
        .store
        .get_user_by_email(email)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", email)))?;

    request.extensions_mut().insert(PrimaryUser(user));

    Ok(next.run(request).await)
}
