// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ambient Azure identity for calling Key Vault.
//!
//! Sources are tried in order:
//! 1. Service principal from `AZURE_TENANT_ID` / `AZURE_CLIENT_ID` / `AZURE_CLIENT_SECRET`
//! 2. App Service / Functions managed identity (`IDENTITY_ENDPOINT` + `IDENTITY_HEADER`)
//! 3. Instance metadata service (VMs, AKS)

use crate::error::AppError;
use serde::Deserialize;
use std::time::Duration;

/// Key Vault resource/audience.
pub const KEY_VAULT_RESOURCE: &str = "https://vault.azure.net";

const AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
/// IMDS is link-local; if nothing answers quickly there is no IMDS.
const IMDS_TIMEOUT: Duration = Duration::from_secs(2);

/// Where the ambient identity comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum AmbientIdentity {
    ServicePrincipal {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    AppService {
        endpoint: String,
        header: String,
        client_id: Option<String>,
    },
    InstanceMetadata {
        client_id: Option<String>,
    },
}

impl std::fmt::Debug for AmbientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmbientIdentity::ServicePrincipal {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ServicePrincipal")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            AmbientIdentity::AppService {
                endpoint,
                client_id,
                ..
            } => f
                .debug_struct("AppService")
                .field("endpoint", endpoint)
                .field("header", &"<redacted>")
                .field("client_id", client_id)
                .finish(),
            AmbientIdentity::InstanceMetadata { client_id } => f
                .debug_struct("InstanceMetadata")
                .field("client_id", client_id)
                .finish(),
        }
    }
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

impl AmbientIdentity {
    /// Pick the identity source from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Pick the identity source using an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let client_id = lookup("AZURE_CLIENT_ID");

        if let (Some(tenant_id), Some(client_id), Some(client_secret)) = (
            lookup("AZURE_TENANT_ID"),
            client_id.clone(),
            lookup("AZURE_CLIENT_SECRET"),
        ) {
            return AmbientIdentity::ServicePrincipal {
                tenant_id,
                client_id,
                client_secret,
            };
        }

        if let (Some(endpoint), Some(header)) =
            (lookup("IDENTITY_ENDPOINT"), lookup("IDENTITY_HEADER"))
        {
            return AmbientIdentity::AppService {
                endpoint,
                header,
                client_id,
            };
        }

        AmbientIdentity::InstanceMetadata { client_id }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AmbientIdentity::ServicePrincipal { .. } => "service_principal",
            AmbientIdentity::AppService { .. } => "app_service",
            AmbientIdentity::InstanceMetadata { .. } => "instance_metadata",
        }
    }

    /// Obtain a bearer token for `resource`.
    pub async fn access_token(
        &self,
        http: &reqwest::Client,
        resource: &str,
    ) -> Result<String, AppError> {
        let request = match self {
            AmbientIdentity::ServicePrincipal {
                tenant_id,
                client_id,
                client_secret,
            } => {
                let scope = format!("{}/.default", resource.trim_end_matches('/'));
                http.post(format!("{}/{}/oauth2/v2.0/token", AUTHORITY_HOST, tenant_id))
                    .form(&[
                        ("grant_type", "client_credentials"),
                        ("client_id", client_id.as_str()),
                        ("client_secret", client_secret.as_str()),
                        ("scope", scope.as_str()),
                    ])
            }
            AmbientIdentity::AppService {
                endpoint,
                header,
                client_id,
            } => {
                let mut query = vec![("api-version", "2019-08-01"), ("resource", resource)];
                if let Some(id) = client_id {
                    query.push(("client_id", id.as_str()));
                }
                http.get(endpoint)
                    .header("X-IDENTITY-HEADER", header)
                    .query(&query)
            }
            AmbientIdentity::InstanceMetadata { client_id } => {
                let mut query = vec![("api-version", "2018-02-01"), ("resource", resource)];
                if let Some(id) = client_id {
                    query.push(("client_id", id.as_str()));
                }
                http.get(IMDS_ENDPOINT)
                    .header("Metadata", "true")
                    .timeout(IMDS_TIMEOUT)
                    .query(&query)
            }
        };

        let response = request.send().await.map_err(|e| {
            AppError::Identity(format!("{} token request failed: {}", self.kind(), e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Identity(format!(
                "{} token request returned HTTP {}: {}",
                self.kind(),
                status,
                body
            )));
        }

        let token: AccessTokenResponse = response.json().await.map_err(|e| {
            AppError::Identity(format!("Failed to parse {} token: {}", self.kind(), e))
        })?;

        tracing::debug!(source = self.kind(), "Acquired ambient access token");
        Ok(token.access_token)
    }
}
