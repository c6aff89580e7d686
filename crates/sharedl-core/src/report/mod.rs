//! Status messages and throttled progress for jobs.
//!
//! `StatusReporter::report` edits the job's status message and persists a
//! status change; both are best effort. Progress goes through a
//! [`ProgressTracker`], which limits edits to one per second and always
//! shows the most recent snapshot.

mod format;
mod throttle;

pub use format::{format_duration, format_size, progress_detail};

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::channel::DeliveryChannel;
use crate::error::NonFatal;
use crate::job::{Job, JobId, JobStatus, JobStore};
use crate::transfer::ProgressSnapshot;

use throttle::TrailingThrottle;

/// Minimum spacing between two progress edits of one status message.
pub const PROGRESS_WINDOW: Duration = Duration::from_secs(1);

/// `URL: <url>\nStatus: <word>[ - <detail>]`
pub fn status_text(source_url: &str, status: JobStatus, detail: Option<&str>) -> String {
    let mut text = format!("URL: {}\nStatus: {}", source_url, status.word());
    if let Some(detail) = detail.map(str::trim).filter(|d| !d.is_empty()) {
        text.push_str(" - ");
        text.push_str(detail);
    }
    text
}

type TrackerSet = Arc<Mutex<HashSet<JobId>>>;

#[derive(Clone)]
pub struct StatusReporter {
    store: Arc<dyn JobStore>,
    channel: Arc<dyn DeliveryChannel>,
    trackers: TrackerSet,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn JobStore>, channel: Arc<dyn DeliveryChannel>) -> Self {
        Self {
            store,
            channel,
            trackers: Arc::default(),
        }
    }

    /// Show `status` (and `detail`) on the job's status message, then set and
    /// save the status if it changed. Neither step can fail the caller.
    pub async fn report(&self, job: &mut Job, status: JobStatus, detail: Option<&str>) {
        let text = status_text(&job.source_url, status, detail);
        if let Err(e) = self
            .channel
            .edit_status_message(&job.destination, &text)
            .await
        {
            NonFatal::Notification(anyhow::Error::new(e)).log(job.id);
        }

        if job.status != status {
            job.status = status;
            self.persist(job).await;
        }
    }

    /// Best-effort save of the whole job record.
    pub async fn persist(&self, job: &Job) {
        if let Err(e) = self.store.save(job).await {
            NonFatal::Persistence(e).log(job.id);
        }
    }

    /// Start throttled progress edits for `job`. Returns `None` if a tracker
    /// for the same job is still alive.
    pub fn track_progress(&self, job: &Job) -> Option<ProgressTracker> {
        {
            let mut active = self.trackers.lock().unwrap_or_else(PoisonError::into_inner);
            if !active.insert(job.id) {
                tracing::warn!(job_id = job.id, "progress tracker already active");
                return None;
            }
        }

        let channel = Arc::clone(&self.channel);
        let job_id = job.id;
        let destination = job.destination;
        let source_url = job.source_url.clone();
        let throttle = TrailingThrottle::spawn(PROGRESS_WINDOW, move |snapshot: ProgressSnapshot| {
            let channel = Arc::clone(&channel);
            let text = status_text(
                &source_url,
                JobStatus::InProgress,
                Some(&progress_detail(&snapshot)),
            );
            async move {
                if let Err(e) = channel.edit_status_message(&destination, &text).await {
                    NonFatal::Notification(anyhow::Error::new(e)).log(job_id);
                }
            }
        });

        Some(ProgressTracker {
            job_id,
            throttle,
            trackers: Arc::clone(&self.trackers),
        })
    }

    pub fn is_tracking(&self, job_id: JobId) -> bool {
        self.trackers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&job_id)
    }
}

/// Live progress feed of one job. Dropping it (or calling [`finish`]) frees
/// the job id for a new tracker.
///
/// [`finish`]: ProgressTracker::finish
pub struct ProgressTracker {
    job_id: JobId,
    throttle: TrailingThrottle<ProgressSnapshot>,
    trackers: TrackerSet,
}

impl ProgressTracker {
    pub fn push(&self, snapshot: ProgressSnapshot) {
        self.throttle.push(snapshot);
    }

    /// Stop editing. A snapshot still inside its window is discarded, so a
    /// status reported after this call is never overwritten by progress.
    pub async fn finish(mut self) {
        self.throttle.finish().await;
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.trackers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.job_id);
    }
}
