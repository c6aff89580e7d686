//! Per-chat configuration and job counts.

use anyhow::{Context, Result};
use sqlx::Row;

use crate::job::{ChatId, DownloadMethod, JobStats, JobStatus};

use super::db::{unix_timestamp, JobDb};

impl JobDb {
    pub async fn get_chat_method(&self, chat_id: ChatId) -> Result<Option<DownloadMethod>> {
        let row = sqlx::query(
            r#"
            SELECT download_method FROM chats WHERE chat_id = ?1
            "#,
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let method: String = row.get("download_method");
        let method = DownloadMethod::parse(&method)
            .with_context(|| format!("chat {}: unknown download method {:?}", chat_id, method))?;
        Ok(Some(method))
    }

    /// Insert or replace the chat's download method.
    pub async fn upsert_chat_method(&self, chat_id: ChatId, method: DownloadMethod) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chats (chat_id, download_method, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(chat_id) DO UPDATE SET download_method = excluded.download_method
            "#,
        )
        .bind(chat_id)
        .bind(method.as_str())
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Count the chat's jobs per status.
    pub async fn chat_stats(&self, chat_id: ChatId) -> Result<JobStats> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS n
            FROM jobs
            WHERE chat_id = ?1
            GROUP BY status
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = JobStats::default();
        for row in rows {
            let status: String = row.get("status");
            let n: i64 = row.get("n");
            stats.add(JobStatus::from_db(&status), n.max(0) as u64);
        }
        Ok(stats)
    }
}
