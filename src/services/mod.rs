// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod blob;
pub mod credentials;
pub mod identity;
pub mod merge;
pub mod strava;
pub mod sync;

pub use blob::{AzureBlobStore, AzureStoreProvider, BlobStore, MemoryBlobStore, StoreProvider};
pub use credentials::CredentialSource;
pub use identity::AmbientIdentity;
pub use merge::{merge_records, MergeOutcome};
pub use strava::StravaClient;
pub use sync::{RunOutcome, SyncJob, SyncSettings};
