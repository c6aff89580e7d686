//! CLI for sharedl.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sharedl_core::config;
use sharedl_core::job_db::JobDb;

use commands::{
    run_cancel, run_method, run_pool, run_remove, run_stats, run_status, run_submit,
};

/// Top-level CLI for sharedl.
#[derive(Debug, Parser)]
#[command(name = "sharedl")]
#[command(about = "sharedl: download share links and deliver the files to a chat outbox", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Extract links from a message and queue one job per link.
    Submit {
        /// Chat the message belongs to.
        #[arg(long, allow_negative_numbers = true)]
        chat: i64,
        /// Id of the message carrying the links (status messages reply to it).
        #[arg(long, default_value = "0")]
        message: i64,
        /// Message text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Run the worker pool: recover interrupted jobs, then process queued ones.
    Run {
        /// Exit once every queued job has finished instead of waiting for Ctrl-C.
        #[arg(long)]
        once: bool,
    },

    /// List jobs, newest first.
    Status {
        /// Only jobs of this chat.
        #[arg(long, allow_negative_numbers = true)]
        chat: Option<i64>,
    },

    /// Show per-status job counts of a chat.
    Stats {
        #[arg(long, allow_negative_numbers = true)]
        chat: i64,
    },

    /// Show or set the download method of a chat.
    Method {
        #[arg(long, allow_negative_numbers = true)]
        chat: i64,
        /// New method (`direct` or `share_api`). Omit to print the current one.
        method: Option<String>,
    },

    /// Cancel a job by ID.
    Cancel {
        /// Job identifier.
        id: i64,
    },

    /// Remove a job and its staged files by ID.
    Remove {
        /// Job identifier.
        id: i64,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let db = JobDb::open_default().await?;

        match cli.command {
            CliCommand::Submit {
                chat,
                message,
                text,
            } => run_submit(&db, &cfg, chat, message, &text.join(" ")).await?,
            CliCommand::Run { once } => run_pool(db, &cfg, once).await?,
            CliCommand::Status { chat } => run_status(&db, chat).await?,
            CliCommand::Stats { chat } => run_stats(&db, chat).await?,
            CliCommand::Method { chat, method } => {
                run_method(&db, &cfg, chat, method.as_deref()).await?
            }
            CliCommand::Cancel { id } => run_cancel(&db, &cfg, id).await?,
            CliCommand::Remove { id } => run_remove(&db, &cfg, id).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
