// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Club-Activity-Sync scheduled job
//!
//! Runs the sync once on startup (unless disabled), then on every tick of
//! the configured cron schedule until interrupted.

use anyhow::Context;
use club_activity_sync::{
    config::Config,
    scheduler::build_scheduler,
    services::{AzureStoreProvider, CredentialSource, StravaClient, SyncJob, SyncSettings},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        club_id = config.strava_club_id,
        schedule = %config.schedule,
        mode = ?config.sync_mode,
        "Starting club activity sync"
    );

    let credentials = CredentialSource::from_config(&config);
    let stores = Arc::new(AzureStoreProvider::new(credentials));
    let strava = StravaClient::from_config(&config);
    let job = Arc::new(SyncJob::new(stores, strava, SyncSettings::from(&config)));

    let mut sched = build_scheduler(job.clone(), &config.schedule).await?;

    if config.run_on_startup {
        tracing::info!("Running startup sync");
        job.run_logged().await;
    }

    sched.start().await.context("starting scheduler")?;
    tracing::info!(schedule = %config.schedule, "Scheduler started");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("Shutdown requested");
    sched.shutdown().await.context("stopping scheduler")?;

    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("club_activity_sync=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
