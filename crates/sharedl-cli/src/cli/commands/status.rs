//! `sharedl status` – list jobs.

use anyhow::Result;
use sharedl_core::job_db::JobDb;

pub async fn run_status(db: &JobDb, chat_id: Option<i64>) -> Result<()> {
    let jobs = db.list_jobs(chat_id).await?;
    if jobs.is_empty() {
        println!("No jobs in database.");
        return Ok(());
    }
    println!(
        "{:<6} {:<12} {:<10} {:<12} {:<6} {}",
        "ID", "STATUS", "METHOD", "CHAT", "FILES", "URL"
    );
    for j in jobs {
        println!(
            "{:<6} {:<12} {:<10} {:<12} {:<6} {}",
            j.id,
            j.status.as_str(),
            j.download_method.as_str(),
            j.destination.chat_id,
            j.downloaded_files.len(),
            j.source_url
        );
    }
    Ok(())
}
