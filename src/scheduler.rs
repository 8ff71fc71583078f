// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cron trigger for the sync job.

use crate::services::SyncJob;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

/// Build a scheduler that runs `job` on every tick of `cron`.
///
/// `cron` has six fields with seconds first, e.g. `0 0 * * * *` for hourly.
/// The scheduler is returned unstarted.
pub async fn build_scheduler(job: Arc<SyncJob>, cron: &str) -> Result<JobScheduler> {
    let sched = JobScheduler::new().await.context("creating scheduler")?;

    let cron_job = Job::new_async(cron, move |_uuid, _l| {
        let job = job.clone();
        Box::pin(async move {
            job.run_logged().await;
        })
    })
    .with_context(|| format!("creating scheduler job for cron {cron}"))?;

    sched.add(cron_job).await.context("adding scheduler job")?;
    Ok(sched)
}
