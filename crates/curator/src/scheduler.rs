//! Periodic refresh scheduling

use crate::cycle::{CycleController, TriggerOutcome};
use anyhow::{Context, Result};
use starterpack_common::config::ScheduleConfig;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

/// Start the cron job that triggers a refresh cycle (UTC).
///
/// Returns `None` when scheduling is disabled.
pub async fn start(
    config: &ScheduleConfig,
    controller: Arc<CycleController>,
) -> Result<Option<JobScheduler>> {
    if !config.enabled {
        info!("Scheduled updates disabled");
        return Ok(None);
    }

    let sched = JobScheduler::new().await.context("creating scheduler")?;
    let cron = config.cron.as_str();
    let job = Job::new_async(cron, move |_uuid, _l| {
        let controller = controller.clone();
        Box::pin(async move {
            info!("Running scheduled update");
            if let TriggerOutcome::Skipped = controller.trigger().await {
                warn!("Scheduled update skipped, previous cycle still running");
            }
        })
    })
    .with_context(|| format!("creating scheduler job for cron {cron}"))?;

    sched.add(job).await.context("adding scheduler job")?;
    sched.start().await.context("starting scheduler")?;
    info!(cron = cron, "Scheduled daily update");

    Ok(Some(sched))
}

/// Kick off a cycle in the background without waiting for it
pub fn spawn_initial(controller: Arc<CycleController>) {
    tokio::spawn(async move {
        info!("Running initial update");
        controller.trigger().await;
    });
}
