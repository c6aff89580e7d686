//! Persistent job database (SQLite via sqlx).
//!
//! Stores jobs (status, downloaded files, destination) and per-chat
//! configuration. Implements the `JobStore` capability used by the core.

mod chats;
mod db;
mod jobs;

pub use db::JobDb;
pub(crate) use db::unix_timestamp;

#[cfg(test)]
pub(crate) use db::open_memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::job::{ChatId, DownloadMethod, Job, JobId, JobStats, JobStatus, JobStore, NewJob};

#[async_trait]
impl JobStore for JobDb {
    async fn create_job(&self, job: &NewJob) -> Result<JobId> {
        self.add_job(job).await
    }

    async fn load(&self, id: JobId) -> Result<Option<Job>> {
        self.get_job(id).await
    }

    async fn save(&self, job: &Job) -> Result<()> {
        self.update_job(job).await
    }

    async fn query_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        self.jobs_with_status(status).await
    }

    async fn delete(&self, id: JobId) -> Result<()> {
        self.remove_job(id).await
    }

    async fn chat_method(&self, chat_id: ChatId) -> Result<Option<DownloadMethod>> {
        self.get_chat_method(chat_id).await
    }

    async fn set_chat_method(&self, chat_id: ChatId, method: DownloadMethod) -> Result<()> {
        self.upsert_chat_method(chat_id, method).await
    }

    async fn stats(&self, chat_id: ChatId) -> Result<JobStats> {
        self.chat_stats(chat_id).await
    }
}

#[cfg(test)]
mod tests;
