//! `sharedl cancel <id>` – cancel a job.
//!
//! A running `sharedl run` owns the queue, so the request goes over its
//! control socket and the runner's reply is printed. With no runner
//! listening, a still-queued job is marked cancelled directly.

use std::sync::Arc;

use anyhow::Result;
use sharedl_core::channel::OutboxChannel;
use sharedl_core::config::SharedlConfig;
use sharedl_core::control::{default_control_socket_path, ControlCommand};
use sharedl_core::job::{JobStatus, JobStore};
use sharedl_core::job_db::JobDb;
use sharedl_core::report::StatusReporter;
use sharedl_core::scheduler::{cancel_stored, CancelOutcome};

use crate::cli::control_socket;

pub async fn run_cancel(db: &JobDb, cfg: &SharedlConfig, id: i64) -> Result<()> {
    let Some(job) = db.load(id).await? else {
        anyhow::bail!("job {id} not found");
    };
    if job.status.is_terminal() {
        println!("Job {id} already {}", job.status.as_str());
        return Ok(());
    }

    let path = default_control_socket_path()?;
    match control_socket::send_command(&path, ControlCommand::Cancel(id)).await {
        Ok(reply) => {
            println!("Job {id}: {reply}");
            return Ok(());
        }
        Err(e) => tracing::debug!("no runner on control socket: {:#}", e),
    }

    let outbox = Arc::new(OutboxChannel::new(cfg.outbox_dir()?));
    let reporter = StatusReporter::new(Arc::new(db.clone()), outbox);
    match cancel_stored(db, &reporter, id).await? {
        CancelOutcome::NotCancellable(JobStatus::InProgress) => {
            anyhow::bail!("job {id} is in progress but no `sharedl run` is listening")
        }
        outcome => println!("Job {id}: {outcome}"),
    }
    Ok(())
}
