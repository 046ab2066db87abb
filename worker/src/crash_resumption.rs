//! Crash resumption (spec §4.4, C8). Runs once at startup, before the
//! worker accepts new ingestion requests: re-enqueues every `PENDING` job
//! and demotes+re-enqueues any `PROCESSING` job stale enough that its
//! owning run is presumed dead.

use chrono::{Duration as ChronoDuration, Utc};
use creditscan_core::error::CoreResult;
use creditscan_core::ids::JobId;
use creditscan_core::model::JobStatus;
use creditscan_store::Pool;
use tracing::{info, instrument, warn};

#[instrument(skip(pool, enqueue))]
pub async fn resume(pool: &Pool, stale_processing_minutes: i64, mut enqueue: impl FnMut(JobId)) -> CoreResult<()> {
    let pending = creditscan_store::jobs::list_pending(pool).await?;
    info!(count = pending.len(), "re-enqueueing pending jobs");
    for job_id in pending {
        enqueue(job_id);
    }

    let stale_before = Utc::now() - ChronoDuration::minutes(stale_processing_minutes);
    let stale = creditscan_store::jobs::list_stale_processing(pool, stale_before).await?;
    info!(count = stale.len(), "demoting stale processing jobs");
    for job_id in stale {
        match creditscan_store::jobs::transition(pool, job_id, JobStatus::Processing, JobStatus::Pending, None, None).await {
            Ok(true) => enqueue(job_id),
            Ok(false) => {
                // Lost the race: another path already moved it out of
                // PROCESSING between the list and this transition.
            }
            Err(err) => warn!(%err, %job_id, "failed to demote stale job"),
        }
    }

    Ok(())
}
