// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Document ID
    pub id: String,
    /// Email address (notification target for the email channel)
    pub email: String,
    /// Display name used in message templates
    #[serde(default)]
    pub name: Option<String>,
    /// Phone number in international format (SMS/WhatsApp target)
    #[serde(default)]
    pub phone: Option<String>,
    /// WHOOP user ID, set after the OAuth callback
    #[serde(default)]
    pub whoop_user_id: Option<u64>,
    /// WHOOP OAuth credential, if connected
    #[serde(default)]
    pub credential: Option<ProviderCredential>,
}

impl User {
    /// Name to address the user by in notifications.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.email.split('@').next().unwrap_or(&self.email),
        }
    }

    /// Phone number, ignoring blank values.
    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref().filter(|p| !p.trim().is_empty())
    }
}

/// OAuth credential for the fitness provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderCredential {
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl ProviderCredential {
    /// Whether the access token expires within `margin` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expires_at - now < margin
    }
}
