// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Resolution of the storage connection string.
//!
//! The source is chosen once at startup: a `CONNECTION_STRING` environment
//! variable if present, otherwise a Key Vault secret read with the ambient
//! identity.

use crate::config::Config;
use crate::error::AppError;
use crate::services::identity::{AmbientIdentity, KEY_VAULT_RESOURCE};
use serde::Deserialize;

/// Key Vault data-plane API version.
const KEY_VAULT_API_VERSION: &str = "7.4";

/// Where the storage connection string comes from.
#[derive(Clone)]
pub enum CredentialSource {
    /// Connection string supplied directly.
    Environment(String),
    /// Connection string stored as a Key Vault secret.
    KeyVault {
        http: reqwest::Client,
        vault_url: String,
        secret_name: String,
        identity: AmbientIdentity,
    },
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::Environment(_) => f.write_str("Environment(<redacted>)"),
            CredentialSource::KeyVault {
                vault_url,
                secret_name,
                identity,
                ..
            } => f
                .debug_struct("KeyVault")
                .field("vault_url", vault_url)
                .field("secret_name", secret_name)
                .field("identity", &identity.kind())
                .finish(),
        }
    }
}

#[derive(Deserialize)]
struct SecretBundle {
    value: Option<String>,
}

impl CredentialSource {
    /// Select the source from configuration.
    pub fn from_config(config: &Config) -> Self {
        match &config.connection_string {
            Some(connection_string) => {
                tracing::info!("Using storage connection string from environment");
                CredentialSource::Environment(connection_string.clone())
            }
            None => {
                let identity = AmbientIdentity::from_env();
                tracing::info!(
                    vault = %config.key_vault_url,
                    secret = %config.key_vault_secret_name,
                    identity = identity.kind(),
                    "Using storage connection string from Key Vault"
                );
                CredentialSource::KeyVault {
                    http: reqwest::Client::new(),
                    vault_url: config.key_vault_url.trim_end_matches('/').to_string(),
                    secret_name: config.key_vault_secret_name.clone(),
                    identity,
                }
            }
        }
    }

    /// Produce the connection string.
    ///
    /// Any failure here is fatal for the run: without it nothing can be
    /// read or written.
    pub async fn resolve(&self) -> Result<String, AppError> {
        match self {
            CredentialSource::Environment(connection_string) => Ok(connection_string.clone()),
            CredentialSource::KeyVault {
                http,
                vault_url,
                secret_name,
                identity,
            } => {
                let token = identity
                    .access_token(http, KEY_VAULT_RESOURCE)
                    .await
                    .map_err(|e| AppError::MissingCredential(e.to_string()))?;
                fetch_secret(http, vault_url, secret_name, &token).await
            }
        }
    }
}

/// Fetch the current version of a Key Vault secret.
async fn fetch_secret(
    http: &reqwest::Client,
    vault_url: &str,
    secret_name: &str,
    token: &str,
) -> Result<String, AppError> {
    let url = format!(
        "{}/secrets/{}",
        vault_url,
        urlencoding::encode(secret_name)
    );

    let response = http
        .get(&url)
        .bearer_auth(token)
        .query(&[("api-version", KEY_VAULT_API_VERSION)])
        .send()
        .await
        .map_err(|e| AppError::Vault(format!("Secret request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Vault(format!(
            "Secret {} returned HTTP {}: {}",
            secret_name, status, body
        )));
    }

    let bundle: SecretBundle = response
        .json()
        .await
        .map_err(|e| AppError::Vault(format!("Failed to parse secret {}: {}", secret_name, e)))?;

    let value = bundle
        .value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::MissingCredential(format!("Secret {} is empty", secret_name)))?;

    tracing::info!(secret = secret_name, "Fetched secret from Key Vault");
    Ok(value)
}
