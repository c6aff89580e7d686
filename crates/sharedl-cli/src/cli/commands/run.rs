//! `sharedl run` – run the worker pool.

use anyhow::Result;
use sharedl_core::channel::{DeliveryChannel, OutboxChannel};
use sharedl_core::config::SharedlConfig;
use sharedl_core::control::{default_control_socket_path, ControlCommand};
use sharedl_core::executor::JobExecutor;
use sharedl_core::job::JobStore;
use sharedl_core::job_db::JobDb;
use sharedl_core::resolver::ResolverRegistry;
use sharedl_core::scheduler::JobScheduler;
use sharedl_core::transfer::{CurlTransfer, TransferOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::cli::control_socket::{self, ControlRequest};

/// How often jobs queued by `sharedl submit` are picked up.
const ADMIT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Control requests waiting for the run loop.
const CONTROL_BACKLOG: usize = 16;

pub async fn run_pool(db: JobDb, cfg: &SharedlConfig, once: bool) -> Result<()> {
    let store: Arc<dyn JobStore> = Arc::new(db);
    let outbox = OutboxChannel::new(cfg.outbox_dir()?);
    tracing::info!(outbox = %outbox.root().display(), "delivering to outbox");
    let channel: Arc<dyn DeliveryChannel> = Arc::new(outbox);

    let executor = JobExecutor::new(
        Arc::clone(&store),
        Arc::clone(&channel),
        Arc::new(ResolverRegistry::with_defaults(cfg)?),
        Arc::new(CurlTransfer::new()),
        cfg.downloads_dir()?,
        TransferOptions::from_config(cfg),
    );

    let (requests, mut commands) = mpsc::channel::<ControlRequest>(CONTROL_BACKLOG);
    let listener = match default_control_socket_path() {
        Ok(path) => match control_socket::spawn_control_listener(requests, &path) {
            Ok(handle) => {
                tracing::debug!(path = %path.display(), "control socket listening");
                Some(handle)
            }
            Err(e) => {
                tracing::warn!("control socket unavailable: {:#}", e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("control socket path: {}", e);
            None
        }
    };

    let scheduler = JobScheduler::start(executor, cfg.max_concurrent_downloads);

    let recovered = scheduler.recover_on_startup(&*store, &*channel).await?;
    if !recovered.reset.is_empty() || !recovered.removed.is_empty() {
        println!(
            "Recovered {} interrupted job(s), removed {} orphaned job(s)",
            recovered.reset.len(),
            recovered.removed.len()
        );
    }
    if !recovered.admitted.is_empty() {
        println!("Resuming {} queued job(s)", recovered.admitted.len());
    }

    if !once {
        println!("Processing jobs; press Ctrl-C to stop.");
    }
    let mut poll = tokio::time::interval(ADMIT_POLL_INTERVAL);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let idle = scheduler.wait_idle();
    tokio::pin!(idle);
    // Control commands and polls run one at a time on this loop.
    loop {
        tokio::select! {
            _ = &mut idle, if once => break,
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    tracing::warn!("ctrl-c handler: {}", e);
                }
                println!("Stopping; running jobs are cancelled, queued jobs stay queued.");
                break;
            }
            Some((command, reply)) = commands.recv() => {
                let _ = reply.send(answer(&scheduler, command).await);
            }
            _ = poll.tick(), if !once => match scheduler.admit_stored(&*store).await {
                Ok(ids) if !ids.is_empty() => tracing::info!(jobs = ?ids, "picked up submitted jobs"),
                Ok(_) => {}
                Err(e) => tracing::warn!("poll queued jobs: {:#}", e),
            },
        }
    }

    scheduler.shutdown().await;
    if let Some(handle) = listener {
        handle.abort();
        if let Ok(path) = default_control_socket_path() {
            let _ = std::fs::remove_file(path);
        }
    }
    tracing::info!("run finished");
    Ok(())
}

/// Apply one control command and produce its reply line.
async fn answer(scheduler: &JobScheduler, command: ControlCommand) -> String {
    match command {
        ControlCommand::Cancel(id) => match scheduler.cancel_job(id).await {
            Ok(outcome) => {
                tracing::info!(job_id = id, %outcome, "cancel via control socket");
                outcome.to_string()
            }
            Err(e) => {
                tracing::warn!(job_id = id, "cancel via control socket: {:#}", e);
                format!("error: {:#}", e)
            }
        },
    }
}
