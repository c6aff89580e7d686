//! Per-job state machine.
//!
//! A run loads the job, resolves its link, transfers every resolved file into
//! the staging directory, delivers the files, and ends in exactly one of
//! `Completed`, `Failed` or `Cancelled`. Each transition is reported on the
//! job's status message and persisted; neither can change the run's course.

mod phase;

pub use phase::Phase;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::channel::DeliveryChannel;
use crate::error::{JobError, NonFatal};
use crate::job::{DownloadedFile, Job, JobId, JobStatus, JobStore};
use crate::report::{format_size, StatusReporter};
use crate::resolver::{ResolvedFile, ResolverRegistry};
use crate::transfer::{
    TransferEngine, TransferEvent, TransferOptions, TransferOutcome, EVENT_CHANNEL_CAPACITY,
};
use crate::url_model::staging_file_name;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The job id was not in the store.
    Missing,
    /// The stored job had already ended, e.g. cancelled while queued.
    Skipped,
    Completed,
    Failed,
    Cancelled,
}

impl RunOutcome {
    fn from_phase(phase: Phase) -> Self {
        match phase {
            Phase::Completed => RunOutcome::Completed,
            Phase::Cancelled => RunOutcome::Cancelled,
            _ => RunOutcome::Failed,
        }
    }
}

/// `<staging_dir>/<job_id>`: every job stages into its own directory.
pub fn job_staging_dir(staging_dir: &Path, job_id: JobId) -> PathBuf {
    staging_dir.join(job_id.to_string())
}

#[derive(Clone)]
pub struct JobExecutor {
    store: Arc<dyn JobStore>,
    channel: Arc<dyn DeliveryChannel>,
    registry: Arc<ResolverRegistry>,
    engine: Arc<dyn TransferEngine>,
    reporter: StatusReporter,
    staging_dir: PathBuf,
    options: TransferOptions,
}

impl JobExecutor {
    pub fn new(
        store: Arc<dyn JobStore>,
        channel: Arc<dyn DeliveryChannel>,
        registry: Arc<ResolverRegistry>,
        engine: Arc<dyn TransferEngine>,
        staging_dir: PathBuf,
        options: TransferOptions,
    ) -> Self {
        let reporter = StatusReporter::new(Arc::clone(&store), Arc::clone(&channel));
        Self {
            store,
            channel,
            registry,
            engine,
            reporter,
            staging_dir,
            options,
        }
    }

    pub fn reporter(&self) -> &StatusReporter {
        &self.reporter
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Directory holding the staged files of one job.
    pub fn job_staging_dir(&self, job_id: JobId) -> PathBuf {
        job_staging_dir(&self.staging_dir, job_id)
    }

    /// Staging path for a resolver file id. Two jobs for the same link never
    /// share a path.
    pub fn staging_path(&self, job_id: JobId, file_id: &str) -> PathBuf {
        self.job_staging_dir(job_id).join(staging_file_name(file_id))
    }

    /// Run job `job_id` to a terminal state.
    pub async fn run(&self, job_id: JobId, cancel: CancellationToken) -> RunOutcome {
        let mut job = match self.store.load(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!(job_id, "job not found, nothing to run");
                return RunOutcome::Missing;
            }
            Err(e) => {
                tracing::error!(job_id, "load job: {:#}", e);
                return RunOutcome::Missing;
            }
        };
        if job.status.is_terminal() {
            tracing::info!(job_id, status = job.status.as_str(), "job already ended, not running");
            return RunOutcome::Skipped;
        }
        tracing::info!(job_id, url = %job.source_url, method = %job.download_method, "job started");

        let mut phase = Phase::Queued;
        let result = self.drive(&mut job, &mut phase, &cancel).await;

        match result {
            Ok(()) => {
                advance(job_id, &mut phase, Phase::Completed);
                // The status message is gone after delivery; only the record changes.
                job.status = phase.persisted_status();
                self.reporter.persist(&job).await;
                tracing::info!(job_id, files = job.downloaded_files.len(), "job completed");
            }
            Err(JobError::Cancelled) => {
                advance(job_id, &mut phase, Phase::Cancelled);
                let detail = JobError::Cancelled.to_string();
                self.reporter
                    .report(&mut job, phase.persisted_status(), Some(&detail))
                    .await;
                tracing::info!(job_id, "job cancelled");
            }
            Err(e) => {
                advance(job_id, &mut phase, Phase::Failed);
                match std::error::Error::source(&e) {
                    Some(source) => tracing::error!(job_id, "job failed: {}: {}", e, source),
                    None => tracing::error!(job_id, "job failed: {}", e),
                }
                let detail = e.to_string();
                self.reporter
                    .report(&mut job, phase.persisted_status(), Some(&detail))
                    .await;
            }
        }

        RunOutcome::from_phase(phase)
    }

    async fn drive(
        &self,
        job: &mut Job,
        phase: &mut Phase,
        cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        advance(job.id, phase, Phase::Resolving);
        self.reporter
            .report(job, phase.persisted_status(), Some("Starting download"))
            .await;
        let files = self.resolve(job, cancel).await?;

        advance(job.id, phase, Phase::Transferring);
        let staged = self.transfer_all(job, &files, cancel).await?;

        advance(job.id, phase, Phase::Delivering);
        self.deliver_all(job, &staged, cancel).await
    }

    async fn resolve(
        &self,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResolvedFile>, JobError> {
        let resolver = self.registry.resolve(job.download_method)?;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
            result = resolver.resolve(&job.source_url, cancel) => result,
        };

        match result {
            Ok(files) if files.is_empty() => Err(JobError::Resolution(anyhow::anyhow!(
                "no files found in share"
            ))),
            Ok(files) => {
                tracing::debug!(job_id = job.id, files = files.len(), "link resolved");
                Ok(files)
            }
            Err(_) if cancel.is_cancelled() => Err(JobError::Cancelled),
            Err(e) => Err(JobError::Resolution(e)),
        }
    }

    /// Transfer every file that is not already staged. Returns what to deliver.
    async fn transfer_all(
        &self,
        job: &mut Job,
        files: &[ResolvedFile],
        cancel: &CancellationToken,
    ) -> Result<Vec<DownloadedFile>, JobError> {
        let mut staged = Vec::with_capacity(files.len());

        for file in files {
            if cancel.is_cancelled() {
                return Err(JobError::Cancelled);
            }
            let path = self.staging_path(job.id, &file.file_id);
            let entry = DownloadedFile {
                file_name: file.file_name.clone(),
                file_path: path.clone(),
            };

            let already_staged = job.has_downloaded(&path)
                && tokio::fs::try_exists(&path).await.unwrap_or(false);
            if already_staged {
                tracing::info!(job_id = job.id, file = %file.file_name, "already downloaded, skipping transfer");
                staged.push(entry);
                continue;
            }

            self.transfer_one(job, file, &path, cancel).await?;

            if !job.has_downloaded(&path) {
                job.downloaded_files.push(entry.clone());
                self.reporter.persist(job).await;
            }
            staged.push(entry);
        }

        Ok(staged)
    }

    async fn transfer_one(
        &self,
        job: &Job,
        file: &ResolvedFile,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        tracing::info!(job_id = job.id, url = %file.direct_url, path = %path.display(), "downloading");

        let tracker = self.reporter.track_progress(job);
        let (events_tx, mut events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let transfer = self
            .engine
            .transfer(&file.direct_url, path, &self.options, cancel, events_tx);
        tokio::pin!(transfer);

        let outcome = loop {
            tokio::select! {
                outcome = &mut transfer => break outcome,
                Some(event) = events.recv() => match event {
                    TransferEvent::Started { total_bytes } => {
                        let size = total_bytes
                            .map(|n| format_size(i64::try_from(n).unwrap_or(i64::MAX)))
                            .unwrap_or_else(|| "Unknown size".to_string());
                        tracing::info!(job_id = job.id, file = %file.file_name, size = %size, "download started");
                    }
                    TransferEvent::Progress(snapshot) => {
                        if let Some(tracker) = &tracker {
                            tracker.push(snapshot);
                        }
                    }
                },
            }
        };

        if let Some(tracker) = tracker {
            tracker.finish().await;
        }

        match outcome {
            TransferOutcome::Completed { bytes } => {
                tracing::info!(job_id = job.id, file = %file.file_name, bytes, "download completed");
                Ok(())
            }
            TransferOutcome::Cancelled => Err(JobError::Cancelled),
            TransferOutcome::Failed(_) if cancel.is_cancelled() => Err(JobError::Cancelled),
            TransferOutcome::Failed(e) => Err(JobError::Transfer(e)),
        }
    }

    async fn deliver_all(
        &self,
        job: &mut Job,
        staged: &[DownloadedFile],
        cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        for file in staged {
            // An upload that already started is allowed to finish.
            if cancel.is_cancelled() {
                return Err(JobError::Cancelled);
            }
            self.reporter
                .report(job, JobStatus::InProgress, Some("Uploading file"))
                .await;
            self.channel
                .send_file(&job.destination, &file.file_path, &file.file_name)
                .await
                .map_err(JobError::Delivery)?;
            tracing::info!(job_id = job.id, file = %file.file_name, "file delivered");

            if let Err(e) = tokio::fs::remove_file(&file.file_path).await {
                NonFatal::Cleanup(e).log(job.id);
            }
        }

        match tokio::fs::remove_dir(self.job_staging_dir(job.id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => NonFatal::Cleanup(e).log(job.id),
        }

        if let Err(e) = self.channel.delete_status_message(&job.destination).await {
            NonFatal::Notification(e).log(job.id);
        }
        Ok(())
    }
}

fn advance(job_id: JobId, phase: &mut Phase, next: Phase) {
    debug_assert!(
        phase.can_advance_to(next),
        "illegal phase change {:?} -> {:?}",
        phase,
        next
    );
    tracing::debug!(job_id, from = ?*phase, to = ?next, "phase");
    *phase = next;
}
