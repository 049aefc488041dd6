// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! WHOOP OAuth authentication routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// How long a signed `state` stays valid.
const STATE_MAX_AGE_MILLIS: u128 = 10 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/whoop", get(auth_start))
        .route("/auth/whoop/callback", get(auth_callback))
        .route("/auth/status", get(auth_status))
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// Build the signed, base64url `state`: `frontend_url|timestamp_hex|signature_hex`.
fn sign_state(frontend_url: &str, timestamp_millis: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", frontend_url, timestamp_millis);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verify signature and age, returning the frontend URL carried in `state`.
fn verify_and_decode_state(state: &str, secret: &[u8], now_millis: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Split from the right so the URL itself may contain '|'.
    let mut parts = state_str.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let frontend_url = parts.next()?;

    let payload = format!("{}|{}", frontend_url, timestamp_hex);
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if !bool::from(signature_hex.as_bytes().ct_eq(expected.as_bytes())) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if now_millis.saturating_sub(issued) > STATE_MAX_AGE_MILLIS {
        tracing::warn!("OAuth state expired");
        return None;
    }

    Some(frontend_url.to_string())
}

/// Start OAuth flow - redirect to WHOOP authorization.
async fn auth_start(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let frontend_url = &state.config.frontend_url;
    let oauth_state = sign_state(frontend_url, now_millis()?, &state.config.oauth_state_key)?;
    let auth_url = state.whoop.client().authorize_url(&oauth_state);

    tracing::info!(
        client_id = %state.config.whoop_client_id,
        frontend_url = %frontend_url,
        "Starting OAuth flow, redirecting to WHOOP"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

fn redirect_error(frontend_url: &str, error: &str) -> Redirect {
    Redirect::temporary(&format!(
        "{}/?error={}",
        frontend_url.trim_end_matches('/'),
        urlencoding::encode(error)
    ))
}

/// OAuth callback - exchange code for tokens and attach them to the user.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let fallback = state.config.frontend_url.clone();

    let Some(frontend_url) = params.state.as_deref().and_then(|s| {
        verify_and_decode_state(s, &state.config.oauth_state_key, now_millis().ok()?)
    }) else {
        tracing::warn!("Invalid, expired or missing state parameter");
        return Ok(redirect_error(&fallback, "invalid_state"));
    };

    if let Some(error) = params.error {
        tracing::warn!(
            error = %error,
            description = params.error_description.as_deref().unwrap_or(""),
            "OAuth error from WHOOP"
        );
        return Ok(redirect_error(&frontend_url, &error));
    }

    let Some(code) = params.code else {
        return Ok(redirect_error(&frontend_url, "missing_code"));
    };

    tracing::info!("Exchanging authorization code for tokens");

    match state
        .whoop
        .handle_oauth_callback(&code, &state.config.primary_user_email)
        .await
    {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "OAuth successful, credential stored");
            Ok(Redirect::temporary(&format!(
                "{}/?success=whoop_connected",
                frontend_url.trim_end_matches('/')
            )))
        }
        Err(e) => {
            tracing::error!(error = %e, "WHOOP token exchange failed");
            Ok(redirect_error(&frontend_url, "token_exchange_failed"))
        }
    }
}

#[derive(Serialize)]
pub struct AuthStatusResponse {
    pub whoop_connected: bool,
    pub whoop_user_id: Option<u64>,
    pub token_expires_at: Option<String>,
}

/// Connection status of the primary user.
async fn auth_status(State(state): State<Arc<AppState>>) -> Result<Json<AuthStatusResponse>> {
    let user = state
        .store
        .get_user_by_email(&state.config.primary_user_email)
        .await?;

    let credential = user.as_ref().and_then(|u| u.credential.as_ref());
    Ok(Json(AuthStatusResponse {
        whoop_connected: credential.is_some(),
        whoop_user_id: user.as_ref().and_then(|u| u.whoop_user_id),
        token_expires_at: credential.map(|c| format_utc_rfc3339(c.expires_at)),
    }))
}
