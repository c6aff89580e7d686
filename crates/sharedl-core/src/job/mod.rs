//! Job records: one submitted share link, from queue to delivery.

mod store;

pub use store::JobStore;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Job identifier (SQLite rowid; ascending ids follow insertion order).
pub type JobId = i64;

/// Chat identifier on the messaging front end.
pub type ChatId = i64;

/// Persisted job status. The executor's finer phases all map to `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Unknown strings map to `Failed` so a corrupt row is never re-run.
    pub fn from_db(s: &str) -> Self {
        match s {
            "queued" => JobStatus::Queued,
            "in_progress" => JobStatus::InProgress,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Failed,
        }
    }

    /// Word shown on the status line of the job's status message.
    pub fn word(self) -> &'static str {
        match self {
            JobStatus::Queued => "Queued",
            JobStatus::InProgress => "In Progress",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
            JobStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which resolver turns the share link into direct URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMethod {
    /// The link already points at the file.
    Direct,
    /// Share-info / download-link JSON API.
    #[default]
    ShareApi,
}

impl DownloadMethod {
    pub const ALL: [DownloadMethod; 2] = [DownloadMethod::Direct, DownloadMethod::ShareApi];

    pub fn as_str(self) -> &'static str {
        match self {
            DownloadMethod::Direct => "direct",
            DownloadMethod::ShareApi => "share_api",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for DownloadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where status updates and delivered files go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub chat_id: ChatId,
    /// Message that carried the link (deliveries reply to it).
    pub message_id: i64,
    /// Message edited with status/progress text.
    pub status_message_id: i64,
}

/// A file that finished transfer and sits at `file_path` awaiting (or after) delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedFile {
    pub file_name: String,
    pub file_path: PathBuf,
}

/// Full job record as stored.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub source_url: String,
    pub status: JobStatus,
    pub retry_count: u32,
    pub downloaded_files: Vec<DownloadedFile>,
    pub download_method: DownloadMethod,
    pub destination: Destination,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Job {
    /// True if a file with this staging path was already checkpointed.
    pub fn has_downloaded(&self, file_path: &std::path::Path) -> bool {
        self.downloaded_files.iter().any(|f| f.file_path == file_path)
    }
}

/// Fields supplied by the submitter; the store assigns id, status and timestamps.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub source_url: String,
    pub download_method: DownloadMethod,
    pub destination: Destination,
}

/// Per-chat job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStats {
    pub queued: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl JobStats {
    pub fn add(&mut self, status: JobStatus, n: u64) {
        match status {
            JobStatus::Queued => self.queued += n,
            JobStatus::InProgress => self.in_progress += n,
            JobStatus::Completed => self.completed += n,
            JobStatus::Failed => self.failed += n,
            JobStatus::Cancelled => self.cancelled += n,
        }
    }
}

impl fmt::Display for JobStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Queued: {}\nFailed: {}\nCompleted: {}\nIn Progress: {}\nCancelled: {}",
            self.queued, self.failed, self.completed, self.in_progress, self.cancelled
        )
    }
}
