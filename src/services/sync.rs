// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One sync run, end to end.
//!
//! Handles the core workflow:
//! 1. Open the blob store, resolving the connection string afresh
//! 2. Read the credential bundle from the secrets blob
//! 3. Refresh the Strava access token
//! 4. Fetch the club activity feed
//! 5. Read the stored records, merge, and write them back
//!    (or, in snapshot mode, overwrite with the raw feed)
//!
//! A failing HTTP status from Strava ends the run with a log line and no
//! write. Everything else (storage, malformed JSON, transport) is returned
//! as an error.

use crate::config::{Config, SyncMode};
use crate::error::{AppError, Result};
use crate::models::{ActivityRecord, CredentialBundle};
use crate::services::blob::{BlobStore, StoreProvider};
use crate::services::merge::merge_records;
use crate::services::strava::StravaClient;
use crate::time_utils::format_ingestion_timestamp;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Blob locations and feed selection for a run.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub secrets_container: String,
    pub secrets_blob: String,
    pub records_container: String,
    pub records_blob: String,
    pub club_id: u64,
    pub mode: SyncMode,
}

impl From<&Config> for SyncSettings {
    fn from(config: &Config) -> Self {
        Self {
            secrets_container: config.secrets_container.clone(),
            secrets_blob: config.secrets_blob.clone(),
            records_container: config.records_container.clone(),
            records_blob: config.records_blob.clone(),
            club_id: config.strava_club_id,
            mode: config.sync_mode,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Records merged and written.
    Completed {
        fetched: usize,
        inserted: usize,
        total: usize,
    },
    /// Feed written as a timestamped snapshot.
    Snapshot { fetched: usize },
    /// Token endpoint returned a failing status; nothing fetched or written.
    TokenRefreshFailed,
    /// Feed endpoint returned a failing status; nothing written.
    FeedFetchFailed,
    /// Another run was still in progress.
    Skipped,
}

/// The scheduled job.
pub struct SyncJob {
    stores: Arc<dyn StoreProvider>,
    strava: StravaClient,
    settings: SyncSettings,
    run_lock: Mutex<()>,
}

impl SyncJob {
    pub fn new(
        stores: Arc<dyn StoreProvider>,
        strava: StravaClient,
        settings: SyncSettings,
    ) -> Self {
        Self {
            stores,
            strava,
            settings,
            run_lock: Mutex::new(()),
        }
    }

    /// Run once and log the result. Used by the scheduler.
    pub async fn run_logged(&self) {
        match self.run_once().await {
            Ok(RunOutcome::Skipped) => {}
            Ok(outcome) => tracing::debug!(?outcome, "Sync run finished"),
            Err(e) => tracing::error!(error = %e, "Sync run failed"),
        }
    }

    /// Run once using the current time for ingestion timestamps.
    pub async fn run_once(&self) -> Result<RunOutcome> {
        self.run_at(Utc::now()).await
    }

    /// Run once, stamping new records with `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunOutcome> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            tracing::warn!("Previous sync run still in progress, skipping this tick");
            return Ok(RunOutcome::Skipped);
        };

        tracing::info!(club_id = self.settings.club_id, mode = ?self.settings.mode, "Sync run started");

        let store = self.stores.open().await?;
        let credentials = self.load_credentials(store.as_ref()).await?;

        let token = match self.strava.refresh_token(&credentials).await {
            Ok(token) => token,
            Err(e) if e.is_upstream_status() => {
                tracing::error!(error = %e, "Failed to get access token from Strava");
                if e.is_strava_unauthorized() {
                    tracing::warn!("Refresh token rejected; the secrets document may need a new one");
                }
                return Ok(RunOutcome::TokenRefreshFailed);
            }
            Err(e) => return Err(e),
        };
        if token.rotated_refresh_token(&credentials.refresh_token) {
            tracing::warn!(
                expires_at = ?token.expires_at,
                "Strava rotated the refresh token; the secrets document still holds the old one"
            );
        }

        let feed = match self
            .strava
            .list_club_activities(&token.access_token, self.settings.club_id)
            .await
        {
            Ok(feed) => feed,
            Err(e) if e.is_upstream_status() => {
                tracing::error!(error = %e, "Failed to get club activities from Strava");
                return Ok(RunOutcome::FeedFetchFailed);
            }
            Err(e) => return Err(e),
        };
        tracing::info!(count = feed.len(), "Fetched club activities");

        let ingested_at = format_ingestion_timestamp(now);

        match self.settings.mode {
            SyncMode::Merge => self.merge_and_store(store.as_ref(), feed, &ingested_at).await,
            SyncMode::Snapshot => self.store_snapshot(store.as_ref(), feed, &ingested_at).await,
        }
    }

    async fn load_credentials(&self, store: &dyn BlobStore) -> Result<CredentialBundle> {
        let raw = store
            .get(&self.settings.secrets_container, &self.settings.secrets_blob)
            .await?
            .ok_or_else(|| {
                AppError::MissingCredential(format!(
                    "Secrets document {}/{} not found",
                    self.settings.secrets_container, self.settings.secrets_blob
                ))
            })?;

        Ok(serde_json::from_slice(&raw)?)
    }

    async fn merge_and_store(
        &self,
        store: &dyn BlobStore,
        feed: Vec<ActivityRecord>,
        ingested_at: &str,
    ) -> Result<RunOutcome> {
        let existing = match store
            .get(&self.settings.records_container, &self.settings.records_blob)
            .await?
        {
            Some(raw) => parse_records_document(&raw)?,
            None => {
                tracing::info!("No records document yet, starting a new collection");
                Vec::new()
            }
        };

        let fetched = feed.len();
        let outcome = merge_records(feed, existing, ingested_at);
        let total = outcome.records.len();

        let body = serde_json::to_vec(&outcome.records)?;
        store
            .put(&self.settings.records_container, &self.settings.records_blob, body)
            .await?;

        tracing::info!(fetched, inserted = outcome.inserted, total, "Records merged and stored");

        Ok(RunOutcome::Completed {
            fetched,
            inserted: outcome.inserted,
            total,
        })
    }

    async fn store_snapshot(
        &self,
        store: &dyn BlobStore,
        feed: Vec<ActivityRecord>,
        ingested_at: &str,
    ) -> Result<RunOutcome> {
        let fetched = feed.len();

        let mut document = Vec::with_capacity(fetched + 1);
        document.push(serde_json::json!({ "timestamp": ingested_at }));
        for record in feed {
            document.push(serde_json::to_value(record)?);
        }

        let body = serde_json::to_vec(&Value::Array(document))?;
        store
            .put(&self.settings.records_container, &self.settings.records_blob, body)
            .await?;

        tracing::info!(fetched, "Club activity snapshot stored");
        Ok(RunOutcome::Snapshot { fetched })
    }
}

/// Parse a stored records document.
///
/// A document last written in snapshot mode starts with a
/// `{"timestamp": ...}` header object. That header is dropped so merge mode
/// can take over the document; every other entry must be an activity record.
fn parse_records_document(raw: &[u8]) -> Result<Vec<ActivityRecord>> {
    let entries: Vec<Value> = serde_json::from_slice(raw)?;
    let mut records = Vec::with_capacity(entries.len());

    for entry in entries {
        if is_snapshot_header(&entry) {
            tracing::warn!(header = %entry, "Dropping snapshot header from records document");
            continue;
        }
        records.push(serde_json::from_value(entry)?);
    }

    Ok(records)
}

fn is_snapshot_header(entry: &Value) -> bool {
    entry
        .as_object()
        .is_some_and(|obj| obj.len() == 1 && obj.get("timestamp").is_some_and(Value::is_string))
}
