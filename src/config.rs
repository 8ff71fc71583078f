// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Only non-sensitive settings live here. The storage connection string is
//! either provided directly via `CONNECTION_STRING` or fetched from Key Vault
//! at run time (see `services::credentials`).

use std::env;

/// Default Key Vault holding the storage connection string.
pub const DEFAULT_KEY_VAULT_URL: &str = "https://stravafunctionapp-vault.vault.azure.net";
/// Default name of the Key Vault secret holding the connection string.
pub const DEFAULT_KEY_VAULT_SECRET: &str = "BlobConnectionString";
/// Hourly, on the hour (seconds field first).
pub const DEFAULT_SCHEDULE: &str = "0 0 * * * *";

/// How each run writes the records document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Read the stored collection, merge new activities in, write it back.
    Merge,
    /// Overwrite the document with a timestamp marker followed by the raw feed.
    Snapshot,
}

impl std::str::FromStr for SyncMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(SyncMode::Merge),
            "snapshot" => Ok(SyncMode::Snapshot),
            other => Err(ConfigError::Invalid("SYNC_MODE", other.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage connection string, if set directly in the environment
    pub connection_string: Option<String>,
    /// Key Vault consulted when `connection_string` is absent
    pub key_vault_url: String,
    /// Secret name holding the connection string
    pub key_vault_secret_name: String,

    /// Container/blob of the credential bundle document
    pub secrets_container: String,
    pub secrets_blob: String,
    /// Container/blob of the accumulated records document
    pub records_container: String,
    pub records_blob: String,

    /// Strava club whose activity feed is synced
    pub strava_club_id: u64,
    /// Strava REST API base URL
    pub strava_api_url: String,
    /// Strava OAuth token endpoint
    pub strava_oauth_url: String,

    /// Cron expression for the trigger
    pub schedule: String,
    /// Run once immediately at process start
    pub run_on_startup: bool,
    pub sync_mode: SyncMode,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            connection_string: env::var("CONNECTION_STRING")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            key_vault_url: env_or("KEY_VAULT_URL", DEFAULT_KEY_VAULT_URL),
            key_vault_secret_name: env_or("KEY_VAULT_SECRET_NAME", DEFAULT_KEY_VAULT_SECRET),

            secrets_container: env_or("SECRETS_CONTAINER", "secrets"),
            secrets_blob: env_or("SECRETS_BLOB", "secrets.json"),
            records_container: env_or("RECORDS_CONTAINER", "records"),
            records_blob: env_or("RECORDS_BLOB", "records.json"),

            strava_club_id: env::var("STRAVA_CLUB_ID")
                .unwrap_or_else(|_| "1142418".to_string())
                .parse()
                .map_err(|_| {
                    ConfigError::Invalid(
                        "STRAVA_CLUB_ID",
                        env::var("STRAVA_CLUB_ID").unwrap_or_default(),
                    )
                })?,
            strava_api_url: env_or("STRAVA_API_URL", "https://www.strava.com/api/v3"),
            strava_oauth_url: env_or("STRAVA_OAUTH_URL", "https://www.strava.com/oauth/token"),

            schedule: env_or("SYNC_SCHEDULE", DEFAULT_SCHEDULE),
            run_on_startup: env::var("RUN_ON_STARTUP")
                .map(|v| !matches!(v.trim(), "0" | "false" | "FALSE" | "False"))
                .unwrap_or(true),
            sync_mode: env::var("SYNC_MODE")
                .unwrap_or_else(|_| "merge".to_string())
                .parse()?,
        })
    }

    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            connection_string: Some(
                "DefaultEndpointsProtocol=http;AccountName=devstoreaccount1;AccountKey=a2V5;BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1"
                    .to_string(),
            ),
            key_vault_url: DEFAULT_KEY_VAULT_URL.to_string(),
            key_vault_secret_name: DEFAULT_KEY_VAULT_SECRET.to_string(),
            secrets_container: "secrets".to_string(),
            secrets_blob: "secrets.json".to_string(),
            records_container: "records".to_string(),
            records_blob: "records.json".to_string(),
            strava_club_id: 1142418,
            strava_api_url: "http://127.0.0.1:9/api/v3".to_string(),
            strava_oauth_url: "http://127.0.0.1:9/oauth/token".to_string(),
            schedule: DEFAULT_SCHEDULE.to_string(),
            run_on_startup: true,
            sync_mode: SyncMode::Merge,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
