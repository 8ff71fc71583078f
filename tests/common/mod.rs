// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use club_activity_sync::config::{Config, SyncMode};
use club_activity_sync::services::{
    AmbientIdentity, CredentialSource, MemoryBlobStore, StoreProvider, StravaClient, SyncJob,
    SyncSettings,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ACCESS_TOKEN: &str = "acc-123";

/// Observable state of the fake Strava API.
pub struct FakeStravaState {
    pub token_status: AtomicU16,
    pub feed_status: AtomicU16,
    pub feed_delay_ms: AtomicU64,
    pub feed: Mutex<Value>,
    pub token_calls: AtomicUsize,
    pub feed_calls: AtomicUsize,
    pub last_token_query: Mutex<HashMap<String, String>>,
    pub last_authorization: Mutex<Option<String>>,
    pub last_club_id: Mutex<Option<u64>>,
}

/// In-process stand-in for the Strava token and club endpoints.
pub struct FakeStrava {
    pub api_url: String,
    pub oauth_url: String,
    pub state: Arc<FakeStravaState>,
}

impl FakeStrava {
    pub async fn start(feed: Value) -> Self {
        let state = Arc::new(FakeStravaState {
            token_status: AtomicU16::new(200),
            feed_status: AtomicU16::new(200),
            feed_delay_ms: AtomicU64::new(0),
            feed: Mutex::new(feed),
            token_calls: AtomicUsize::new(0),
            feed_calls: AtomicUsize::new(0),
            last_token_query: Mutex::new(HashMap::new()),
            last_authorization: Mutex::new(None),
            last_club_id: Mutex::new(None),
        });

        let app = Router::new()
            .route("/oauth/token", post(token_handler))
            .route("/api/v3/clubs/{club_id}/activities", get(feed_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake Strava");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            api_url: format!("http://{}/api/v3", addr),
            oauth_url: format!("http://{}/oauth/token", addr),
            state,
        }
    }

    pub fn client(&self) -> StravaClient {
        StravaClient::new(&self.api_url, &self.oauth_url)
    }
}

async fn token_handler(
    State(state): State<Arc<FakeStravaState>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    state.token_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_token_query.lock().unwrap() = params;

    let status = StatusCode::from_u16(state.token_status.load(Ordering::SeqCst)).unwrap();
    if !status.is_success() {
        return (
            status,
            Json(json!({"message": "Authorization Error", "errors": []})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "token_type": "Bearer",
            "access_token": ACCESS_TOKEN,
            "expires_at": 1_900_000_000,
            "expires_in": 21600,
            "refresh_token": "r-tok-rotated"
        })),
    )
}

async fn feed_handler(
    State(state): State<Arc<FakeStravaState>>,
    Path(club_id): Path<u64>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.feed_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_club_id.lock().unwrap() = Some(club_id);
    *state.last_authorization.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let delay = state.feed_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let status = StatusCode::from_u16(state.feed_status.load(Ordering::SeqCst)).unwrap();
    if !status.is_success() {
        return (status, Json(json!({"message": "Server Error"})));
    }

    let feed = state.feed.lock().unwrap().clone();
    (StatusCode::OK, Json(feed))
}

/// A club activity as Strava returns it.
#[allow(dead_code)]
pub fn club_activity(firstname: &str, distance: f64, moving_time: i64) -> Value {
    json!({
        "resource_state": 2,
        "athlete": {"resource_state": 2, "firstname": firstname, "lastname": "T."},
        "name": format!("{} run", firstname),
        "distance": distance,
        "moving_time": moving_time,
        "elapsed_time": moving_time + 60,
        "total_elevation_gain": 12.5,
        "type": "Run",
        "sport_type": "Run",
        "workout_type": null
    })
}

/// Memory store seeded with a valid secrets document.
#[allow(dead_code)]
pub fn seeded_store() -> Arc<MemoryBlobStore> {
    let store = Arc::new(MemoryBlobStore::new());
    store.insert(
        "secrets",
        "secrets.json",
        r#"{"client_id": "12345", "client_secret": "shh", "refresh": "r-tok"}"#,
    );
    store
}

/// Build a sync job wired to the fake Strava and the given store.
#[allow(dead_code)]
pub fn job_for(strava: &FakeStrava, store: Arc<MemoryBlobStore>, mode: SyncMode) -> SyncJob {
    job_with_provider(strava, store, mode)
}

/// Build a sync job wired to the fake Strava and any store provider.
#[allow(dead_code)]
pub fn job_with_provider(
    strava: &FakeStrava,
    stores: Arc<dyn StoreProvider>,
    mode: SyncMode,
) -> SyncJob {
    let mut config = Config::test_default();
    config.sync_mode = mode;
    SyncJob::new(stores, strava.client(), SyncSettings::from(&config))
}

/// Parse the stored records document.
#[allow(dead_code)]
pub fn stored_records(store: &MemoryBlobStore) -> Vec<Value> {
    let raw = store
        .contents("records", "records.json")
        .expect("records document should exist");
    serde_json::from_slice(&raw).expect("records document should be JSON")
}

// ─── Fake Azure ──────────────────────────────────────────────────────────────

#[allow(dead_code)]
pub const VAULT_TOKEN: &str = "vault-tok";
#[allow(dead_code)]
pub const IDENTITY_HEADER: &str = "id-hdr";
#[allow(dead_code)]
pub const SECRET_NAME: &str = "BlobConnectionString";
#[allow(dead_code)]
/// base64 of "key"
pub const ACCOUNT_KEY: &str = "a2V5";

#[allow(dead_code)]
/// Observable state of the fake managed identity, Key Vault and Blob endpoints.
pub struct FakeAzureState {
    pub identity_status: AtomicU16,
    pub secret_status: AtomicU16,
    /// Non-zero forces every blob request to fail with this status
    pub blob_status: AtomicU16,
    pub secret_value: Mutex<String>,
    pub identity_calls: AtomicUsize,
    pub secret_calls: AtomicUsize,
    pub blob_gets: AtomicUsize,
    pub blob_puts: AtomicUsize,
    pub blobs: Mutex<HashMap<String, Vec<u8>>>,
    pub last_identity_header: Mutex<Option<String>>,
    pub last_identity_query: Mutex<HashMap<String, String>>,
    pub last_vault_authorization: Mutex<Option<String>>,
    pub last_vault_query: Mutex<HashMap<String, String>>,
    pub last_secret_name: Mutex<Option<String>>,
    pub last_account: Mutex<Option<String>>,
    pub last_put_headers: Mutex<HashMap<String, String>>,
}

#[allow(dead_code)]
/// In-process stand-in for App Service managed identity, Key Vault and Blob Storage.
pub struct FakeAzure {
    pub base_url: String,
    pub state: Arc<FakeAzureState>,
}

#[allow(dead_code)]
impl FakeAzure {
    pub async fn start() -> Self {
        let state = Arc::new(FakeAzureState {
            identity_status: AtomicU16::new(200),
            secret_status: AtomicU16::new(200),
            blob_status: AtomicU16::new(0),
            secret_value: Mutex::new(String::new()),
            identity_calls: AtomicUsize::new(0),
            secret_calls: AtomicUsize::new(0),
            blob_gets: AtomicUsize::new(0),
            blob_puts: AtomicUsize::new(0),
            blobs: Mutex::new(HashMap::new()),
            last_identity_header: Mutex::new(None),
            last_identity_query: Mutex::new(HashMap::new()),
            last_vault_authorization: Mutex::new(None),
            last_vault_query: Mutex::new(HashMap::new()),
            last_secret_name: Mutex::new(None),
            last_account: Mutex::new(None),
            last_put_headers: Mutex::new(HashMap::new()),
        });

        let app = Router::new()
            .route("/msi/token", get(identity_handler))
            .route("/secrets/{name}", get(secret_handler))
            .route(
                "/{account}/{container}/{blob}",
                get(blob_get_handler).put(blob_put_handler),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake Azure");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let azure = Self {
            base_url: format!("http://{}", addr),
            state,
        };
        *azure.state.secret_value.lock().unwrap() = azure.connection_string("acct");
        azure
    }

    /// Account key connection string pointing at this server.
    pub fn connection_string(&self, account: &str) -> String {
        format!(
            "DefaultEndpointsProtocol=http;AccountName={account};AccountKey={key};BlobEndpoint={base}/{account}",
            account = account,
            key = ACCOUNT_KEY,
            base = self.base_url,
        )
    }

    /// Key Vault source using the fake App Service identity.
    pub fn key_vault_source(&self) -> CredentialSource {
        CredentialSource::KeyVault {
            http: reqwest::Client::new(),
            vault_url: self.base_url.clone(),
            secret_name: SECRET_NAME.to_string(),
            identity: AmbientIdentity::AppService {
                endpoint: format!("{}/msi/token", self.base_url),
                header: IDENTITY_HEADER.to_string(),
                client_id: None,
            },
        }
    }

    pub fn seed(&self, account: &str, container: &str, blob: &str, body: impl Into<Vec<u8>>) {
        self.state
            .blobs
            .lock()
            .unwrap()
            .insert(blob_key(account, container, blob), body.into());
    }

    /// Seed the secrets document expected by the sync job.
    pub fn seed_secrets(&self, account: &str) {
        self.seed(
            account,
            "secrets",
            "secrets.json",
            r#"{"client_id": "12345", "client_secret": "shh", "refresh": "r-tok"}"#,
        );
    }

    pub fn blob(&self, account: &str, container: &str, blob: &str) -> Option<Vec<u8>> {
        self.state
            .blobs
            .lock()
            .unwrap()
            .get(&blob_key(account, container, blob))
            .cloned()
    }
}

fn blob_key(account: &str, container: &str, blob: &str) -> String {
    format!("{}/{}/{}", account, container, blob)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn identity_handler(
    State(state): State<Arc<FakeAzureState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.identity_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_identity_query.lock().unwrap() = params;
    *state.last_identity_header.lock().unwrap() = header_value(&headers, "x-identity-header");

    let status = StatusCode::from_u16(state.identity_status.load(Ordering::SeqCst)).unwrap();
    if !status.is_success() {
        return (status, Json(json!({"error": "unavailable"})));
    }

    (
        StatusCode::OK,
        Json(json!({
            "access_token": VAULT_TOKEN,
            "expires_on": "1900000000",
            "resource": "https://vault.azure.net",
            "token_type": "Bearer"
        })),
    )
}

async fn secret_handler(
    State(state): State<Arc<FakeAzureState>>,
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.secret_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_secret_name.lock().unwrap() = Some(name.clone());
    *state.last_vault_query.lock().unwrap() = params;
    *state.last_vault_authorization.lock().unwrap() = header_value(&headers, "authorization");

    let status = StatusCode::from_u16(state.secret_status.load(Ordering::SeqCst)).unwrap();
    if !status.is_success() {
        return (status, Json(json!({"error": {"code": "Forbidden"}})));
    }

    let value = state.secret_value.lock().unwrap().clone();
    (
        StatusCode::OK,
        Json(json!({"value": value, "id": format!("https://vault/secrets/{}/1", name)})),
    )
}

fn forced_blob_status(state: &FakeAzureState) -> Option<StatusCode> {
    match state.blob_status.load(Ordering::SeqCst) {
        0 => None,
        code => StatusCode::from_u16(code).ok(),
    }
}

async fn blob_get_handler(
    State(state): State<Arc<FakeAzureState>>,
    Path((account, container, blob)): Path<(String, String, String)>,
) -> (StatusCode, Vec<u8>) {
    state.blob_gets.fetch_add(1, Ordering::SeqCst);
    *state.last_account.lock().unwrap() = Some(account.clone());

    if let Some(status) = forced_blob_status(&state) {
        return (status, b"<Error><Code>InternalError</Code></Error>".to_vec());
    }

    let stored = state
        .blobs
        .lock()
        .unwrap()
        .get(&blob_key(&account, &container, &blob))
        .cloned();
    match stored {
        Some(body) => (StatusCode::OK, body),
        None => (
            StatusCode::NOT_FOUND,
            b"<Error><Code>BlobNotFound</Code></Error>".to_vec(),
        ),
    }
}

async fn blob_put_handler(
    State(state): State<Arc<FakeAzureState>>,
    Path((account, container, blob)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    state.blob_puts.fetch_add(1, Ordering::SeqCst);
    *state.last_account.lock().unwrap() = Some(account.clone());
    *state.last_put_headers.lock().unwrap() = [
        "authorization",
        "content-type",
        "x-ms-blob-type",
        "x-ms-date",
        "x-ms-version",
    ]
    .iter()
    .filter_map(|name| header_value(&headers, name).map(|v| (name.to_string(), v)))
    .collect();

    if let Some(status) = forced_blob_status(&state) {
        return status;
    }

    state
        .blobs
        .lock()
        .unwrap()
        .insert(blob_key(&account, &container, &blob), body.to_vec());
    StatusCode::CREATED
}
