//! Startup recovery of jobs interrupted by a crash or restart.

use anyhow::Result;

use crate::channel::{DeliveryChannel, EditError};
use crate::error::NonFatal;
use crate::job::{JobId, JobStatus, JobStore};
use crate::report::status_text;

use super::JobScheduler;

/// What `recover_on_startup` did, by job id.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// `InProgress` jobs put back to `Queued`.
    pub reset: Vec<JobId>,
    /// Jobs deleted because their status message is gone.
    pub removed: Vec<JobId>,
    /// Jobs handed to the workers, in id order.
    pub admitted: Vec<JobId>,
}

impl JobScheduler {
    /// Reset interrupted jobs to `Queued` and admit every queued job.
    ///
    /// A job whose status message no longer exists is deleted and its chat
    /// gets a notice instead. Only a failed query aborts recovery; per-job
    /// failures are logged.
    pub async fn recover_on_startup(
        &self,
        store: &dyn JobStore,
        channel: &dyn DeliveryChannel,
    ) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();

        for mut job in store.query_by_status(JobStatus::InProgress).await? {
            job.status = JobStatus::Queued;
            let text = status_text(&job.source_url, JobStatus::Queued, None);

            match channel.edit_status_message(&job.destination, &text).await {
                Ok(()) => {}
                Err(EditError::NotFound) => {
                    tracing::info!(job_id = job.id, "status message gone, removing job");
                    if let Err(e) = store.delete(job.id).await {
                        NonFatal::Persistence(e).log(job.id);
                    }
                    let notice = format!(
                        "Download of {} was dropped after a restart because its status message was deleted.",
                        job.source_url
                    );
                    if let Err(e) = channel.notify(job.destination.chat_id, &notice).await {
                        NonFatal::Notification(e).log(job.id);
                    }
                    report.removed.push(job.id);
                    continue;
                }
                Err(EditError::Other(e)) => NonFatal::Notification(e).log(job.id),
            }

            if let Err(e) = store.save(&job).await {
                NonFatal::Persistence(e).log(job.id);
            }
            report.reset.push(job.id);
        }

        let mut queued: Vec<JobId> = store
            .query_by_status(JobStatus::Queued)
            .await?
            .into_iter()
            .map(|job| job.id)
            .collect();
        // A reset whose save failed is still queued as far as this run is concerned.
        queued.extend(report.reset.iter().copied());
        queued.sort_unstable();
        queued.dedup();

        for job_id in queued {
            if self.admit(job_id) {
                report.admitted.push(job_id);
            }
        }

        tracing::info!(
            reset = report.reset.len(),
            removed = report.removed.len(),
            admitted = report.admitted.len(),
            "startup recovery done"
        );
        Ok(report)
    }

    /// Admit stored `Queued` jobs that are not admitted yet, e.g. jobs another
    /// process submitted while this one is running.
    pub async fn admit_stored(&self, store: &dyn JobStore) -> Result<Vec<JobId>> {
        let mut admitted = Vec::new();
        for job in store.query_by_status(JobStatus::Queued).await? {
            if !self.is_admitted(job.id) && self.admit(job.id) {
                admitted.push(job.id);
            }
        }
        Ok(admitted)
    }
}
