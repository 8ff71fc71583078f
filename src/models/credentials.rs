// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! OAuth credential models.

use serde::Deserialize;

/// Strava app credentials plus the long-lived refresh token,
/// read from the secrets document at the start of each run.
#[derive(Clone, Deserialize)]
pub struct CredentialBundle {
    pub client_id: String,
    pub client_secret: String,
    /// Refresh token (stored under the key `refresh`)
    #[serde(rename = "refresh")]
    pub refresh_token: String,
}

impl std::fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Token refresh response from Strava.
///
/// Only `access_token` is required. A rotated refresh token is reported in
/// the logs but never written back to the secrets document.
#[derive(Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token expiry, Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl TokenRefreshResponse {
    /// True if Strava handed back a refresh token different from `current`.
    pub fn rotated_refresh_token(&self, current: &str) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty() && token != current)
    }
}

impl std::fmt::Debug for TokenRefreshResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRefreshResponse")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
