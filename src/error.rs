// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types shared by every stage of a sync run.

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No storage credential available: {0}")]
    MissingCredential(String),

    #[error("Key Vault error: {0}")]
    Vault(String),

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Blob storage error: {0}")]
    Storage(String),

    /// Strava answered, but with a non-success status.
    #[error("Strava API returned HTTP {status}: {body}")]
    StravaStatus { status: u16, body: String },

    /// Transport or decoding failure talking to Strava.
    #[error("Strava API error: {0}")]
    StravaApi(String),

    #[error("Malformed JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True when an upstream Strava call completed with a failing HTTP status.
    ///
    /// These end a run early without being treated as a crash.
    pub fn is_upstream_status(&self) -> bool {
        matches!(self, AppError::StravaStatus { .. })
    }

    /// True for 401 responses, which usually mean the refresh token was revoked.
    pub fn is_strava_unauthorized(&self) -> bool {
        matches!(self, AppError::StravaStatus { status: 401, .. })
    }
}

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, AppError>;
