//! Single-process cooperative job queue (spec §4.1's C13): the submission
//! point the job runner is invoked from. Built directly on `rt::Task` and
//! `rt::task::join_pool_on_shutdown`'s ephemeral-task channel, the same
//! structured-concurrency primitives the teacher's background processor
//! and node use for their own spawned work.

use std::sync::Arc;

use creditscan_core::ids::JobId;
use rt::{Shutdown, Task};
use tokio::sync::{mpsc, Semaphore};
use tracing::instrument;

use crate::job_runner::JobRunner;

/// Handle for submitting job ids to the queue. Cloning is cheap; every
/// clone shares the same channel to the pool-joining task and the same
/// concurrency limiter.
#[derive(Clone)]
pub struct JobQueue {
    eph_tasks_tx: mpsc::Sender<Task<()>>,
    runner: Arc<JobRunner>,
    shutdown: Shutdown,
    /// Bounds how many job runs execute at once to `worker_count`;
    /// submission itself is never blocked by this, only the run's actual
    /// start is gated on a permit.
    concurrency: Arc<Semaphore>,
}

impl JobQueue {
    /// `eph_tasks_tx` is the sending half the caller passes to
    /// `rt::task::join_pool_on_shutdown` alongside the worker's static
    /// tasks, so every job run is joined at shutdown.
    pub fn new(eph_tasks_tx: mpsc::Sender<Task<()>>, runner: Arc<JobRunner>, shutdown: Shutdown, worker_count: usize) -> Self {
        Self {
            eph_tasks_tx,
            runner,
            shutdown,
            concurrency: Arc::new(Semaphore::new(worker_count.max(1))),
        }
    }

    /// Spawns a job run as an ephemeral task and hands it to the pool
    /// joiner. Synchronous and non-blocking: the send only waits for
    /// channel capacity, never for the run itself; the run waits for a
    /// concurrency permit internally.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub fn submit(&self, job_id: JobId) {
        let runner = Arc::clone(&self.runner);
        let shutdown = self.shutdown.clone();
        let concurrency = Arc::clone(&self.concurrency);
        let task = Task::spawn(format!("job-runner-{job_id}"), async move {
            let _permit = concurrency.acquire_owned().await.expect("semaphore is never closed");
            runner.run(job_id, shutdown).await;
        });
        if self.eph_tasks_tx.try_send(task).is_err() {
            tracing::warn!("pool joiner already shut down, job run spawned but detached from shutdown tracking");
        }
    }
}
