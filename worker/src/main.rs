mod collaborators;
mod config;
mod crash_resumption;
mod job_runner;
mod queue;
mod rate_scheduler;
mod rule_applier;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use collaborators::{FsBlobStore, HttpExtractor, HttpLiveRateClient, HttpRateHtmlSource};
use config::{Args, WorkerConfig};
use job_runner::JobRunner;
use queue::JobQueue;
use rate_scheduler::RateScheduler;
use rt::{task::join_pool_on_shutdown, Shutdown, Task};
use tokio::sync::mpsc;
use tracing::info;

pub fn main() -> anyhow::Result<()> {
    let args = argh::from_env::<Args>();
    let config = WorkerConfig::from(args);

    logger::init();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    rt.block_on(run(config))
}

async fn run(config: WorkerConfig) -> anyhow::Result<()> {
    let pool = creditscan_store::pool::connect(&config.database_url, config.max_db_connections).await?;
    creditscan_store::pool::migrate(&pool).await?;

    let blob_store: Arc<dyn collaborators::BlobStore> = Arc::new(FsBlobStore::new(config.blob_store_root.clone()));
    let extractor: Arc<dyn collaborators::Extractor> = Arc::new(HttpExtractor::new(
        config.extractor_url.clone(),
        config.extractor_primary_model.clone(),
        config.extractor_fallback_model.clone(),
    ));
    let live_rate_client: Arc<dyn collaborators::LiveRateClient> = Arc::new(HttpLiveRateClient::new(config.live_rate_url.clone()));
    let rate_html_source: Arc<dyn collaborators::RateHtmlSource> = Arc::new(HttpRateHtmlSource::new(config.rate_html_url.clone()));

    let shutdown = Shutdown::new();
    let runner = Arc::new(JobRunner::new(
        pool.clone(),
        blob_store,
        extractor,
        live_rate_client,
        Duration::from_secs(config.job_visibility_timeout_secs),
    ));

    let (eph_tasks_tx, eph_tasks_rx) = mpsc::channel(config.worker_count.max(1) * 4);
    let queue = JobQueue::new(eph_tasks_tx, Arc::clone(&runner), shutdown.clone(), config.worker_count);

    crash_resumption::resume(&pool, config.stale_processing_minutes, |job_id| queue.submit(job_id)).await?;

    let scheduler = Arc::new(RateScheduler::new(
        pool.clone(),
        rate_html_source,
        config.rate_fire_hour_utc,
        config.rate_fire_minute_utc,
    ));
    let scheduler_task = {
        let scheduler = Arc::clone(&scheduler);
        let shutdown = shutdown.clone();
        Task::spawn("rate-scheduler", async move { scheduler.run(shutdown).await })
    };

    info!("worker started, awaiting ctrl-c");
    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("ctrl-c received, shutting down");
    shutdown.send();

    join_pool_on_shutdown(
        vec![scheduler_task],
        eph_tasks_rx,
        shutdown,
        Duration::from_secs(config.shutdown_timeout_secs),
    )
    .await
    .context("error while shutting down worker task pool")
}
