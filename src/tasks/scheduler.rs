use std::{sync::Arc, time::Duration};

use anyhow::{ensure, Result};
use tokio_cron_scheduler::{Job, JobScheduler};

pub type RescanCallback = Arc<dyn Fn() + Send + Sync>;

/// Registers the periodic fallback rescan. Mutation batches can arrive in
/// bursts or be missed while the feed is replaced wholesale, so the scanner
/// is also poked on a fixed interval.
pub async fn configure_rescan_job(
    interval: Duration,
    callback: RescanCallback,
) -> Result<JobScheduler> {
    ensure!(!interval.is_zero(), "rescan interval must be positive");
    let scheduler = JobScheduler::new().await?;
    let cb = callback.clone();
    let job = Job::new_repeated_async(interval, move |_id, _l| {
        let cb = cb.clone();
        Box::pin(async move {
            tracing::trace!(target: "scheduler", "periodic rescan triggered");
            cb();
        })
    })?;
    scheduler.add(job).await?;
    tracing::info!(target: "scheduler", interval_secs = interval.as_secs(), "rescan job registered");
    scheduler.start().await?;
    Ok(scheduler)
}
