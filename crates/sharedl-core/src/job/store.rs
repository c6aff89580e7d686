//! Persistence capability used by the executor, reporter and scheduler.

use anyhow::Result;
use async_trait::async_trait;

use super::{ChatId, DownloadMethod, Job, JobId, JobStats, JobStatus, NewJob};

/// CRUD-style job storage. Every executor run loads its own copy of a job;
/// nothing in the core shares a `Job` value between runs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new `Queued` job and return its id.
    async fn create_job(&self, job: &NewJob) -> Result<JobId>;

    async fn load(&self, id: JobId) -> Result<Option<Job>>;

    /// Write status, retry count and downloaded files back.
    async fn save(&self, job: &Job) -> Result<()>;

    /// Jobs in `status`, oldest first.
    async fn query_by_status(&self, status: JobStatus) -> Result<Vec<Job>>;

    async fn delete(&self, id: JobId) -> Result<()>;

    /// Download method configured for a chat, if the chat is known.
    async fn chat_method(&self, chat_id: ChatId) -> Result<Option<DownloadMethod>>;

    async fn set_chat_method(&self, chat_id: ChatId, method: DownloadMethod) -> Result<()>;

    async fn stats(&self, chat_id: ChatId) -> Result<JobStats>;
}
