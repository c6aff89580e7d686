//! Byte transfer of resolved files into staging paths.
//!
//! An engine fetches one direct URL into one local file, reports a `Started`
//! event followed by any number of `Progress` events on a bounded channel, and
//! returns a terminal [`TransferOutcome`]. Events are sent with `try_send`: a
//! slow consumer loses intermediate snapshots, never the outcome.

mod curl_engine;
mod error;
mod progress;
mod segment;
mod single;

pub use curl_engine::CurlTransfer;
pub use error::SegmentError;

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::SharedlConfig;

/// Capacity callers should use for the event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// How a single file is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOptions {
    /// Split the file into ranges fetched in parallel when the server allows it.
    pub segmented: bool,
    /// Number of ranges when segmented. Always at least 1.
    pub segment_count: usize,
    pub user_agent: String,
}

impl TransferOptions {
    pub fn from_config(cfg: &SharedlConfig) -> Self {
        Self {
            segmented: cfg.chunked_download,
            segment_count: if cfg.chunked_download {
                cfg.chunk_count.max(1)
            } else {
                1
            },
            user_agent: cfg.user_agent.clone(),
        }
    }
}

/// Point-in-time progress of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub bytes_received: u64,
    /// `None` when the server did not announce a length.
    pub total_bytes: Option<u64>,
    pub bytes_per_sec: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Started { total_bytes: Option<u64> },
    Progress(ProgressSnapshot),
}

/// Terminal result of a transfer.
#[derive(Debug)]
pub enum TransferOutcome {
    Completed { bytes: u64 },
    Failed(anyhow::Error),
    Cancelled,
}

impl TransferOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferOutcome::Completed { .. })
    }
}

#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Fetch `direct_url` into `destination`. Never panics on network or disk
    /// errors; those come back as `TransferOutcome::Failed`.
    async fn transfer(
        &self,
        direct_url: &str,
        destination: &Path,
        options: &TransferOptions,
        cancel: &CancellationToken,
        events: mpsc::Sender<TransferEvent>,
    ) -> TransferOutcome;
}
