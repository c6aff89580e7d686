//! Job write operations: add, save, status, remove.

use anyhow::Result;

use crate::job::{Job, JobId, JobStatus, NewJob};

use super::super::db::{unix_timestamp, JobDb};

impl JobDb {
    /// Insert a new queued job.
    pub async fn add_job(&self, job: &NewJob) -> Result<JobId> {
        let now = unix_timestamp();

        let row_id = sqlx::query(
            r#"
            INSERT INTO jobs (
                source_url, status, retry_count, downloaded_files, download_method,
                chat_id, message_id, status_message_id, created_at, updated_at
            ) VALUES (?1, ?2, 0, '[]', ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&job.source_url)
        .bind(JobStatus::Queued.as_str())
        .bind(job.download_method.as_str())
        .bind(job.destination.chat_id)
        .bind(job.destination.message_id)
        .bind(job.destination.status_message_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(row_id)
    }

    /// Write the mutable fields of a job back (status, retry count, downloaded files).
    /// Url, method and destination are immutable and never rewritten.
    pub async fn update_job(&self, job: &Job) -> Result<()> {
        let now = unix_timestamp();
        let files_json = serde_json::to_string(&job.downloaded_files)?;
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?1,
                retry_count = ?2,
                downloaded_files = ?3,
                updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(job.status.as_str())
        .bind(i64::from(job.retry_count))
        .bind(files_json)
        .bind(now)
        .bind(job.id)
        .execute(&self.pool)
        .await?;

        if r.rows_affected() == 0 {
            anyhow::bail!("job {} not found", job.id);
        }
        Ok(())
    }

    /// Update only the status of an existing job.
    pub async fn set_status(&self, id: JobId, status: JobStatus) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Permanently remove a job row. Staged files are handled by higher layers.
    pub async fn remove_job(&self, id: JobId) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
