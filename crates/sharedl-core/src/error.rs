//! Job error taxonomy.
//!
//! `JobError` ends a job. `NonFatal` is everything the pipeline logs and
//! carries on from: each swallow site builds one and calls `log`.

use thiserror::Error;

use crate::job::{DownloadMethod, JobId};

/// Errors that terminate a job run.
#[derive(Debug, Error)]
pub enum JobError {
    /// No resolver registered for the job's download method.
    #[error("download method {0} is not supported")]
    UnsupportedMethod(DownloadMethod),
    /// The share link could not be turned into direct URLs.
    #[error("{0:#}")]
    Resolution(anyhow::Error),
    /// Network or write failure while downloading.
    #[error("{0:#}")]
    Transfer(anyhow::Error),
    /// Upload to the destination failed. The staged file is kept.
    #[error("Failed to upload file")]
    Delivery(#[source] anyhow::Error),
    /// The job's cancellation token was tripped.
    #[error("Download cancelled")]
    Cancelled,
}

impl JobError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobError::Cancelled)
    }
}

/// Side-effect failures that never change a job's trajectory.
#[derive(Debug, Error)]
pub enum NonFatal {
    /// Saving the job record failed; the persisted status may be stale.
    #[error("persist job state: {0:#}")]
    Persistence(anyhow::Error),
    /// Editing, deleting or sending a message to the front end failed.
    #[error("notify destination: {0:#}")]
    Notification(anyhow::Error),
    /// Removing a staged file failed.
    #[error("clean up staged file: {0}")]
    Cleanup(std::io::Error),
}

impl NonFatal {
    pub fn log(&self, job_id: JobId) {
        tracing::warn!(job_id, "{}", self);
    }
}
