//! Job read operations: load, list, query by status.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::job::{ChatId, Destination, DownloadMethod, DownloadedFile, Job, JobId, JobStatus};

use super::super::db::JobDb;

const JOB_COLUMNS: &str = "id, source_url, status, retry_count, downloaded_files, \
     download_method, chat_id, message_id, status_message_id, created_at, updated_at";

fn job_from_row(row: &SqliteRow) -> Result<Job> {
    let id: i64 = row.get("id");
    let status: String = row.get("status");
    let retry_count: i64 = row.get("retry_count");
    let files_json: String = row.get("downloaded_files");
    let method: String = row.get("download_method");

    let downloaded_files: Vec<DownloadedFile> = serde_json::from_str(&files_json)
        .with_context(|| format!("job {}: invalid downloaded_files JSON", id))?;
    let download_method = DownloadMethod::parse(&method)
        .with_context(|| format!("job {}: unknown download method {:?}", id, method))?;

    Ok(Job {
        id,
        source_url: row.get("source_url"),
        status: JobStatus::from_db(&status),
        retry_count: retry_count.max(0) as u32,
        downloaded_files,
        download_method,
        destination: Destination {
            chat_id: row.get("chat_id"),
            message_id: row.get("message_id"),
            status_message_id: row.get("status_message_id"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl JobDb {
    /// Fetch a single job with all fields.
    pub async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    /// Jobs in the given status, oldest first (insertion order).
    pub async fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM jobs WHERE status = ?1 ORDER BY id ASC",
            JOB_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    /// List jobs newest first, optionally only those of one chat.
    pub async fn list_jobs(&self, chat_id: Option<ChatId>) -> Result<Vec<Job>> {
        let rows = match chat_id {
            Some(chat) => {
                sqlx::query(&format!(
                    "SELECT {} FROM jobs WHERE chat_id = ?1 ORDER BY id DESC",
                    JOB_COLUMNS
                ))
                .bind(chat)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!("SELECT {} FROM jobs ORDER BY id DESC", JOB_COLUMNS))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(job_from_row).collect()
    }
}
