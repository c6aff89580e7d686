//! `sharedl remove <id>` – remove a job and its staged files.

use anyhow::Result;
use sharedl_core::channel::{DeliveryChannel, OutboxChannel};
use sharedl_core::config::SharedlConfig;
use sharedl_core::executor::job_staging_dir;
use sharedl_core::job::{JobStatus, JobStore};
use sharedl_core::job_db::JobDb;

/// Running jobs are refused; cancel them first.
pub async fn run_remove(db: &JobDb, cfg: &SharedlConfig, id: i64) -> Result<()> {
    let Some(job) = db.load(id).await? else {
        anyhow::bail!("job {id} not found");
    };
    if job.status == JobStatus::InProgress {
        anyhow::bail!("job {id} is in progress; cancel it first");
    }

    for file in &job.downloaded_files {
        match tokio::fs::remove_file(&file.file_path).await {
            Ok(()) => tracing::debug!(path = %file.file_path.display(), "deleted staged file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %file.file_path.display(), "could not delete staged file: {}", e)
            }
        }
    }

    // Partial transfers live next to the recorded files.
    let staging = job_staging_dir(&cfg.downloads_dir()?, id);
    match tokio::fs::remove_dir_all(&staging).await {
        Ok(()) => tracing::debug!(path = %staging.display(), "deleted staging directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %staging.display(), "could not delete staging directory: {}", e),
    }

    let outbox = OutboxChannel::new(cfg.outbox_dir()?);
    if let Err(e) = outbox.delete_status_message(&job.destination).await {
        tracing::warn!(job_id = id, "could not delete status message: {:#}", e);
    }

    db.delete(id).await?;
    println!("Removed job {id}");
    Ok(())
}
