//! `sharedl method --chat <id> [<method>]` – show or set a chat's download method.

use anyhow::Result;
use sharedl_core::config::SharedlConfig;
use sharedl_core::job::{DownloadMethod, JobStore};
use sharedl_core::job_db::JobDb;
use sharedl_core::submit::chat_method;

pub async fn run_method(
    db: &JobDb,
    cfg: &SharedlConfig,
    chat_id: i64,
    method: Option<&str>,
) -> Result<()> {
    let Some(name) = method else {
        let current = chat_method(db, chat_id, cfg.default_download_method).await?;
        println!("{current}");
        return Ok(());
    };

    let Some(method) = DownloadMethod::parse(name) else {
        let valid: Vec<&str> = DownloadMethod::ALL.iter().map(|m| m.as_str()).collect();
        anyhow::bail!(
            "unknown download method {:?} (expected one of: {})",
            name,
            valid.join(", ")
        );
    };
    db.set_chat_method(chat_id, method).await?;
    println!("Chat {chat_id} now uses {method}");
    Ok(())
}
