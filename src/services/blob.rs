// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Azure Blob Storage access for the secrets and records documents.
//!
//! Talks to the Blob REST API directly. Requests are authorized either with
//! a Shared Key signature (HMAC-SHA256 over the canonical request) or with
//! a SAS token taken from the connection string.

use crate::error::{AppError, Result};
use crate::services::credentials::CredentialSource;
use crate::time_utils::format_http_date;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// REST API version sent with every request.
const STORAGE_API_VERSION: &str = "2021-08-06";

/// Well-known Azurite (local emulator) account.
const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// Object storage holding whole JSON documents.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Download a blob. A missing blob (or container) is `Ok(None)`.
    async fn get(&self, container: &str, blob: &str) -> Result<Option<Vec<u8>>>;

    /// Upload a blob, unconditionally replacing any existing content.
    async fn put(&self, container: &str, blob: &str, body: Vec<u8>) -> Result<()>;
}

// ─── Connection String ───────────────────────────────────────────────────────

/// Storage account details parsed from a connection string.
#[derive(Clone)]
pub struct StorageAccount {
    pub name: String,
    pub blob_endpoint: String,
    key: Option<Vec<u8>>,
    sas_token: Option<String>,
}

impl std::fmt::Debug for StorageAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAccount")
            .field("name", &self.name)
            .field("blob_endpoint", &self.blob_endpoint)
            .field("shared_key", &self.key.is_some())
            .field("sas", &self.sas_token.is_some())
            .finish()
    }
}

impl StorageAccount {
    /// Parse an Azure Storage connection string.
    ///
    /// Supports account key strings, `BlobEndpoint` overrides, SAS strings
    /// and `UseDevelopmentStorage=true`.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let parts: HashMap<&str, &str> = connection_string
            .split(';')
            .filter_map(|part| part.trim().split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();

        if parts
            .get("UseDevelopmentStorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Self::development();
        }

        let key = parts
            .get("AccountKey")
            .map(|k| {
                BASE64
                    .decode(k)
                    .map_err(|e| AppError::Storage(format!("AccountKey is not base64: {}", e)))
            })
            .transpose()?;

        let sas_token = parts
            .get("SharedAccessSignature")
            .map(|s| s.trim_start_matches('?').to_string());

        if key.is_none() && sas_token.is_none() {
            return Err(AppError::Storage(
                "Connection string has neither AccountKey nor SharedAccessSignature".to_string(),
            ));
        }

        let blob_endpoint = match (parts.get("BlobEndpoint"), parts.get("AccountName")) {
            (Some(endpoint), _) => endpoint.trim_end_matches('/').to_string(),
            (None, Some(account)) => {
                let protocol = parts.get("DefaultEndpointsProtocol").unwrap_or(&"https");
                let suffix = parts.get("EndpointSuffix").unwrap_or(&"core.windows.net");
                format!("{}://{}.blob.{}", protocol, account, suffix)
            }
            (None, None) => {
                return Err(AppError::Storage(
                    "Connection string has neither AccountName nor BlobEndpoint".to_string(),
                ))
            }
        };

        let name = match parts.get("AccountName") {
            Some(account) => account.to_string(),
            None if key.is_some() => {
                return Err(AppError::Storage(
                    "AccountName is required with AccountKey".to_string(),
                ))
            }
            None => String::new(),
        };

        Ok(Self {
            name,
            blob_endpoint,
            key,
            sas_token,
        })
    }

    fn development() -> Result<Self> {
        let key = BASE64
            .decode(DEV_ACCOUNT_KEY)
            .map_err(|e| AppError::Storage(format!("Invalid development key: {}", e)))?;
        Ok(Self {
            name: DEV_ACCOUNT_NAME.to_string(),
            blob_endpoint: DEV_BLOB_ENDPOINT.to_string(),
            key: Some(key),
            sas_token: None,
        })
    }

    /// Build the Authorization header value for a Shared Key request.
    ///
    /// `ms_headers` are the `x-ms-*` headers sent with the request and
    /// `url_path` is the encoded path of the request URL.
    fn shared_key_authorization(
        &self,
        key: &[u8],
        method: &str,
        content_length: usize,
        content_type: &str,
        ms_headers: &[(&str, &str)],
        url_path: &str,
    ) -> Result<String> {
        // Empty Content-Length when zero, per the 2015-02-21+ signing rules
        let length = if content_length == 0 {
            String::new()
        } else {
            content_length.to_string()
        };

        let mut headers: Vec<(String, &str)> = ms_headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.trim()))
            .collect();
        headers.sort_by(|a, b| a.0.cmp(&b.0));
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let string_to_sign = format!(
            "{method}\n\n\n{length}\n\n{content_type}\n\n\n\n\n\n\n{canonical_headers}/{account}{url_path}",
            account = self.name,
        );

        let mut mac = HmacSha256::new_from_slice(key)
            .map_err(|e| AppError::Storage(format!("Invalid account key: {}", e)))?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());

        Ok(format!("SharedKey {}:{}", self.name, signature))
    }
}

// ─── Azure Blob Store ────────────────────────────────────────────────────────

/// Blob store backed by the Azure Blob REST API.
#[derive(Clone)]
pub struct AzureBlobStore {
    http: reqwest::Client,
    account: StorageAccount,
}

impl AzureBlobStore {
    pub fn new(account: StorageAccount) -> Self {
        Self::with_client(reqwest::Client::new(), account)
    }

    /// Build a store that shares an existing HTTP client.
    pub fn with_client(http: reqwest::Client, account: StorageAccount) -> Self {
        Self { http, account }
    }

    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let account = StorageAccount::from_connection_string(connection_string)?;
        tracing::info!(
            account = %account.name,
            endpoint = %account.blob_endpoint,
            "Blob storage client configured"
        );
        Ok(Self::new(account))
    }

    fn blob_url(&self, container: &str, blob: &str) -> Result<reqwest::Url> {
        let mut url = format!(
            "{}/{}/{}",
            self.account.blob_endpoint,
            urlencoding::encode(container),
            urlencoding::encode(blob)
        );
        if let Some(sas) = &self.account.sas_token {
            url.push('?');
            url.push_str(sas);
        }
        reqwest::Url::parse(&url)
            .map_err(|e| AppError::Storage(format!("Invalid blob URL {}: {}", url, e)))
    }

    /// Prepare a request with version/date headers and authorization.
    fn authorized_request(
        &self,
        method: reqwest::Method,
        url: reqwest::Url,
        content_length: usize,
        content_type: &str,
        extra_ms_headers: &[(&str, &str)],
    ) -> Result<reqwest::RequestBuilder> {
        let date = format_http_date(chrono::Utc::now());
        let mut ms_headers = vec![
            ("x-ms-date", date.as_str()),
            ("x-ms-version", STORAGE_API_VERSION),
        ];
        ms_headers.extend_from_slice(extra_ms_headers);

        let mut request = self.http.request(method.clone(), url.clone());
        for (name, value) in &ms_headers {
            request = request.header(*name, *value);
        }

        if let Some(key) = &self.account.key {
            let authorization = self.account.shared_key_authorization(
                key,
                method.as_str(),
                content_length,
                content_type,
                &ms_headers,
                url.path(),
            )?;
            request = request.header(reqwest::header::AUTHORIZATION, authorization);
        }

        Ok(request)
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn get(&self, container: &str, blob: &str) -> Result<Option<Vec<u8>>> {
        let url = self.blob_url(container, blob)?;
        let response = self
            .authorized_request(reqwest::Method::GET, url, 0, "", &[])?
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Download of {}/{} failed: {}", container, blob, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(container, blob, "Blob not found");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Storage(format!(
                "Download of {}/{} returned HTTP {}: {}",
                container, blob, status, body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Storage(format!("Reading {}/{} failed: {}", container, blob, e)))?;
        tracing::debug!(container, blob, size = bytes.len(), "Blob downloaded");
        Ok(Some(bytes.to_vec()))
    }

    async fn put(&self, container: &str, blob: &str, body: Vec<u8>) -> Result<()> {
        let url = self.blob_url(container, blob)?;
        let size = body.len();
        let response = self
            .authorized_request(
                reqwest::Method::PUT,
                url,
                size,
                "application/json",
                &[("x-ms-blob-type", "BlockBlob")],
            )?
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Upload of {}/{} failed: {}", container, blob, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Storage(format!(
                "Upload of {}/{} returned HTTP {}: {}",
                container, blob, status, body
            )));
        }

        tracing::debug!(container, blob, size, "Blob uploaded");
        Ok(())
    }
}

// ─── Store Providers ─────────────────────────────────────────────────────────

/// Hands out the blob store for one run.
///
/// Called once at the start of every run, so a rotated connection string
/// or storage key is picked up on the next tick.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn BlobStore>>;
}

/// Resolves the connection string and builds an [`AzureBlobStore`] per run.
pub struct AzureStoreProvider {
    source: CredentialSource,
    http: reqwest::Client,
}

impl AzureStoreProvider {
    pub fn new(source: CredentialSource) -> Self {
        Self {
            source,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl StoreProvider for AzureStoreProvider {
    async fn open(&self) -> Result<Arc<dyn BlobStore>> {
        let connection_string = self.source.resolve().await?;
        let account = StorageAccount::from_connection_string(&connection_string)?;
        tracing::debug!(
            account = %account.name,
            endpoint = %account.blob_endpoint,
            "Blob storage client configured"
        );
        Ok(Arc::new(AzureBlobStore::with_client(
            self.http.clone(),
            account,
        )))
    }
}

// ─── In-Memory Store ─────────────────────────────────────────────────────────

/// In-memory blob store for tests and local dry runs.
///
/// Clones share the same blobs, so the store can also act as its own
/// [`StoreProvider`].
#[derive(Default, Clone)]
pub struct MemoryBlobStore {
    blobs: Arc<DashMap<(String, String), Vec<u8>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob without counting it as a write.
    pub fn insert(&self, container: &str, blob: &str, body: impl Into<Vec<u8>>) {
        self.blobs
            .insert((container.to_string(), blob.to_string()), body.into());
    }

    /// Current content of a blob.
    pub fn contents(&self, container: &str, blob: &str) -> Option<Vec<u8>> {
        self.blobs
            .get(&(container.to_string(), blob.to_string()))
            .map(|b| b.value().clone())
    }

    /// Number of `put` calls made so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, container: &str, blob: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.contents(container, blob))
    }

    async fn put(&self, container: &str, blob: &str, body: Vec<u8>) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.insert(container, blob, body);
        Ok(())
    }
}

#[async_trait]
impl StoreProvider for MemoryBlobStore {
    async fn open(&self) -> Result<Arc<dyn BlobStore>> {
        Ok(Arc::new(self.clone()))
    }
}
