//! Turning a chat message into queued jobs.

use anyhow::{Context, Result};

use crate::channel::DeliveryChannel;
use crate::config::SharedlConfig;
use crate::job::{ChatId, Destination, DownloadMethod, JobId, JobStatus, JobStore, NewJob};
use crate::report::status_text;
use crate::scheduler::JobScheduler;

pub const NO_LINKS_NOTICE: &str = "No links found in the message.";

/// `http(s)` links in `text`, in order. Unless `accept_any_host` is set only
/// links whose host contains `box` are kept.
pub fn extract_links(text: &str, accept_any_host: bool) -> Vec<String> {
    text.split_whitespace()
        .map(|token| token.trim_matches(|c: char| matches!(c, '<' | '>' | '(' | ')' | '"' | '\'' | ',')))
        .filter(|token| token.starts_with("http://") || token.starts_with("https://"))
        .filter(|token| {
            let Ok(url) = url::Url::parse(token) else {
                return false;
            };
            accept_any_host
                || url
                    .host_str()
                    .is_some_and(|h| h.to_ascii_lowercase().contains("box"))
        })
        .map(str::to_string)
        .collect()
}

/// The chat's download method, recording `default` for a chat seen the first time.
pub async fn chat_method(
    store: &dyn JobStore,
    chat_id: ChatId,
    default: DownloadMethod,
) -> Result<DownloadMethod> {
    if let Some(method) = store.chat_method(chat_id).await? {
        return Ok(method);
    }
    store.set_chat_method(chat_id, default).await?;
    Ok(default)
}

/// Create one job per link in `text` and admit it to `scheduler` when given.
///
/// Each job gets its own status message replying to `message_id`. Without a
/// scheduler the jobs stay `Queued` for a running pool to pick up.
pub async fn submit_links(
    store: &dyn JobStore,
    channel: &dyn DeliveryChannel,
    scheduler: Option<&JobScheduler>,
    cfg: &SharedlConfig,
    chat_id: ChatId,
    message_id: i64,
    text: &str,
) -> Result<Vec<JobId>> {
    let links = extract_links(text, cfg.accept_any_host);
    if links.is_empty() {
        tracing::info!(chat_id, "no links found in message");
        channel
            .notify(chat_id, NO_LINKS_NOTICE)
            .await
            .context("send no-links notice")?;
        return Ok(Vec::new());
    }

    let method = chat_method(store, chat_id, cfg.default_download_method).await?;

    let mut ids = Vec::with_capacity(links.len());
    for link in links {
        let status_message_id = channel
            .create_status_message(chat_id, message_id, &status_text(&link, JobStatus::Queued, None))
            .await
            .context("create status message")?;
        let id = store
            .create_job(&NewJob {
                source_url: link.clone(),
                download_method: method,
                destination: Destination {
                    chat_id,
                    message_id,
                    status_message_id,
                },
            })
            .await?;
        tracing::info!(job_id = id, chat_id, url = %link, %method, "job queued");

        if let Some(scheduler) = scheduler {
            scheduler.admit(id);
        }
        ids.push(id);
    }
    Ok(ids)
}
