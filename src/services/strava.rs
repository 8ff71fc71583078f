// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for the club activity feed.
//!
//! Handles:
//! - Exchanging the stored refresh token for a short-lived access token
//! - Fetching the club activity list with bearer auth
//!
//! A non-success status comes back as [`AppError::StravaStatus`] so the
//! caller can end the run quietly; transport and decode failures are
//! [`AppError::StravaApi`].

use crate::config::Config;
use crate::error::AppError;
use crate::models::{ActivityRecord, CredentialBundle, TokenRefreshResponse};
use serde::Deserialize;

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    oauth_url: String,
}

impl StravaClient {
    /// Create a client against the given API base and token endpoint.
    pub fn new(base_url: impl Into<String>, oauth_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            oauth_url: oauth_url.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.strava_api_url, &config.strava_oauth_url)
    }

    /// Exchange the refresh token for an access token.
    ///
    /// Parameters go in the query string, matching what the Strava token
    /// endpoint accepts for the `refresh_token` grant.
    pub async fn refresh_token(
        &self,
        credentials: &CredentialBundle,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(&self.oauth_url)
            .query(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", credentials.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token refresh request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// List the most recent activities of a club.
    pub async fn list_club_activities(
        &self,
        access_token: &str,
        club_id: u64,
    ) -> Result<Vec<ActivityRecord>, AppError> {
        let url = format!("{}/clubs/{}/activities", self.base_url, club_id);
        self.get_json(&url, access_token).await
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Strava rate limit hit (429)");
            }

            return Err(AppError::StravaStatus {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
    }
}
