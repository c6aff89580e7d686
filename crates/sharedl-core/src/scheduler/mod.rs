//! Fixed worker pool running admitted jobs.
//!
//! `start` spawns `max_concurrent` workers that share one FIFO queue of job
//! ids, so at most that many executors run at once. A job id is admitted at
//! most once until its run returns; its cancellation token exists from
//! admission, so cancelling a job still waiting in the queue makes its run
//! end `Cancelled` as soon as a worker picks it up. A stored job that was
//! never admitted is cancelled by marking its record.

mod recover;

pub use recover::RecoveryReport;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::control::JobControl;
use crate::error::JobError;
use crate::executor::JobExecutor;
use crate::job::{JobId, JobStatus, JobStore};
use crate::report::StatusReporter;

type SharedQueue = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<JobId>>>;

/// What a cancel request did. `Display` gives the reply sent to the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job is admitted here; its run ends `Cancelled`.
    Signalled,
    /// The stored job was still queued and is now `Cancelled`.
    CancelledQueued,
    /// The job has this status and cannot be cancelled from here.
    NotCancellable(JobStatus),
    NotFound,
}

impl fmt::Display for CancelOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelOutcome::Signalled => f.write_str("cancel requested"),
            CancelOutcome::CancelledQueued => f.write_str("cancelled"),
            CancelOutcome::NotCancellable(status) if status.is_terminal() => {
                write!(f, "already {}", status.as_str())
            }
            CancelOutcome::NotCancellable(status) => {
                write!(f, "not cancellable while {}", status.word())
            }
            CancelOutcome::NotFound => f.write_str("not found"),
        }
    }
}

/// Cancel a job no scheduler has admitted. A stored `Queued` job is marked
/// `Cancelled` and its status message updated; any other status is left as is.
pub async fn cancel_stored(
    store: &dyn JobStore,
    reporter: &StatusReporter,
    job_id: JobId,
) -> Result<CancelOutcome> {
    let Some(mut job) = store.load(job_id).await? else {
        return Ok(CancelOutcome::NotFound);
    };
    if job.status != JobStatus::Queued {
        return Ok(CancelOutcome::NotCancellable(job.status));
    }
    let detail = JobError::Cancelled.to_string();
    reporter
        .report(&mut job, JobStatus::Cancelled, Some(&detail))
        .await;
    tracing::info!(job_id, "queued job cancelled before admission");
    Ok(CancelOutcome::CancelledQueued)
}

pub struct JobScheduler {
    queue: mpsc::UnboundedSender<JobId>,
    executor: JobExecutor,
    control: Arc<JobControl>,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobScheduler {
    /// Spawn `max(1, max_concurrent)` workers. Must be called inside a tokio runtime.
    pub fn start(executor: JobExecutor, max_concurrent: usize) -> Self {
        let control = Arc::new(JobControl::new());
        let worker_count = max_concurrent.max(1);
        let (queue, rx) = mpsc::unbounded_channel();
        let rx: SharedQueue = Arc::new(tokio::sync::Mutex::new(rx));
        let shutdown = CancellationToken::new();

        let workers = (0..worker_count)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    Arc::clone(&rx),
                    executor.clone(),
                    Arc::clone(&control),
                    shutdown.clone(),
                ))
            })
            .collect();
        tracing::info!(workers = worker_count, "scheduler started");

        Self {
            queue,
            executor,
            control,
            shutdown,
            workers: Mutex::new(workers),
        }
    }

    /// Queue `job_id` for execution. Never blocks. Returns false if the job is
    /// already admitted or running, or the scheduler is shut down.
    pub fn admit(&self, job_id: JobId) -> bool {
        if self.shutdown.is_cancelled() {
            tracing::warn!(job_id, "scheduler shut down, job not admitted");
            return false;
        }
        if self.control.admit(job_id).is_none() {
            tracing::warn!(job_id, "job already admitted");
            return false;
        }
        if self.queue.send(job_id).is_err() {
            self.control.release(job_id);
            tracing::warn!(job_id, "scheduler queue closed");
            return false;
        }
        tracing::debug!(job_id, "job admitted");
        true
    }

    /// Request cancellation of an admitted job. False if it is not admitted.
    pub fn cancel(&self, job_id: JobId) -> bool {
        let found = self.control.cancel(job_id);
        if found {
            tracing::info!(job_id, "cancellation requested");
        }
        found
    }

    /// Cancel `job_id` whether or not it is admitted. An admitted job has its
    /// token tripped; a stored `Queued` job is marked `Cancelled` so later
    /// admission skips it.
    pub async fn cancel_job(&self, job_id: JobId) -> Result<CancelOutcome> {
        if self.cancel(job_id) {
            return Ok(CancelOutcome::Signalled);
        }
        let outcome =
            cancel_stored(self.executor.store().as_ref(), self.executor.reporter(), job_id)
                .await?;
        // Admitted while the record was being marked; its run sees the
        // stored status or the tripped token.
        if outcome == CancelOutcome::CancelledQueued {
            self.control.cancel(job_id);
        }
        Ok(outcome)
    }

    pub fn is_admitted(&self, job_id: JobId) -> bool {
        self.control.is_admitted(job_id)
    }

    /// Resolves when no job is admitted or running.
    pub async fn wait_idle(&self) {
        self.control.wait_idle().await;
    }

    /// Cancel running jobs, stop the workers and wait for them. Jobs still
    /// waiting in the queue are not run and keep their stored status.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.control.cancel_all();

        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!("scheduler worker: {}", e);
            }
        }
        self.control.release_all();
        tracing::info!("scheduler stopped");
    }
}

async fn worker_loop(
    worker: usize,
    queue: SharedQueue,
    executor: JobExecutor,
    control: Arc<JobControl>,
    shutdown: CancellationToken,
) {
    loop {
        let next = {
            let mut rx = queue.lock().await;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                id = rx.recv() => id,
            }
        };
        let Some(job_id) = next else {
            break;
        };
        let Some(cancel) = control.token(job_id) else {
            tracing::warn!(job_id, "dequeued job has no admission entry");
            continue;
        };

        tracing::debug!(worker, job_id, "worker picked job");
        let outcome = executor.run(job_id, cancel).await;
        tracing::debug!(worker, job_id, ?outcome, "worker finished job");
        control.release(job_id);
    }
}
