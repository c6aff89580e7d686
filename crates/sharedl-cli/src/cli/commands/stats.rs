//! `sharedl stats --chat <id>` – job counts per status.

use anyhow::Result;
use sharedl_core::job::JobStore;
use sharedl_core::job_db::JobDb;

pub async fn run_stats(db: &JobDb, chat_id: i64) -> Result<()> {
    let stats = db.stats(chat_id).await?;
    println!("{stats}");
    Ok(())
}
