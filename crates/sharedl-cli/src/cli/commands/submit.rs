//! `sharedl submit` – queue one job per link in a message.

use anyhow::Result;
use sharedl_core::channel::OutboxChannel;
use sharedl_core::config::SharedlConfig;
use sharedl_core::job_db::JobDb;
use sharedl_core::submit::{submit_links, NO_LINKS_NOTICE};

/// Jobs are only persisted; a running `sharedl run` picks them up.
pub async fn run_submit(
    db: &JobDb,
    cfg: &SharedlConfig,
    chat_id: i64,
    message_id: i64,
    text: &str,
) -> Result<()> {
    let outbox = OutboxChannel::new(cfg.outbox_dir()?);
    let ids = submit_links(db, &outbox, None, cfg, chat_id, message_id, text).await?;
    if ids.is_empty() {
        println!("{}", NO_LINKS_NOTICE);
    }
    for id in ids {
        println!("Queued job {id}");
    }
    Ok(())
}
