//! `TransferEngine` backed by libcurl.
//!
//! Whole-file mode is one streamed GET. Segmented mode probes the file with
//! HEAD first; when the size is known and ranges are accepted the file is
//! preallocated and each range is fetched on its own thread, written at its
//! offset. The first failing segment aborts the others.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use curl::easy::Easy;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::fetch_head;
use crate::segmenter::{plan_segments, Segment};
use crate::storage::StorageWriter;

use super::progress::ProgressCounter;
use super::{segment, single};
use super::{SegmentError, TransferEngine, TransferEvent, TransferOptions, TransferOutcome};

/// Curl handle with the options every request of a transfer shares.
pub(super) fn easy_for(url: &str, user_agent: &str) -> Result<Easy, curl::Error> {
    let mut easy = Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.useragent(user_agent)?;
    easy.connect_timeout(Duration::from_secs(30))?;
    // Abort when throughput stays under 1 KiB/s for a minute.
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;
    // Enables the progress callback, which is where cancellation is polled.
    easy.progress(true)?;
    Ok(easy)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CurlTransfer;

impl CurlTransfer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransferEngine for CurlTransfer {
    async fn transfer(
        &self,
        direct_url: &str,
        destination: &Path,
        options: &TransferOptions,
        cancel: &CancellationToken,
        events: mpsc::Sender<TransferEvent>,
    ) -> TransferOutcome {
        let url = direct_url.to_string();
        let destination = destination.to_path_buf();
        let options = options.clone();
        let cancel = cancel.clone();

        let joined = tokio::task::spawn_blocking(move || {
            run_blocking(&url, &destination, &options, &cancel, events)
        })
        .await;

        match joined {
            Ok(outcome) => outcome,
            Err(e) => TransferOutcome::Failed(anyhow::anyhow!("transfer task: {}", e)),
        }
    }
}

fn run_blocking(
    url: &str,
    destination: &Path,
    options: &TransferOptions,
    cancel: &CancellationToken,
    events: mpsc::Sender<TransferEvent>,
) -> TransferOutcome {
    if cancel.is_cancelled() {
        return TransferOutcome::Cancelled;
    }

    let progress = ProgressCounter::new(events);
    let storage = match StorageWriter::create(destination) {
        Ok(s) => s,
        Err(e) => return TransferOutcome::Failed(e),
    };

    let plan = if options.segmented && options.segment_count > 1 {
        plan_ranges(url, options)
    } else {
        None
    };

    let result = match plan {
        Some((total, segments)) => {
            if let Err(e) = storage.preallocate(total) {
                return TransferOutcome::Failed(e);
            }
            tracing::debug!(url, total, segments = segments.len(), "segmented transfer");
            progress.begin(Some(total));
            fetch_segments(url, &options.user_agent, &segments, &storage, &progress, cancel)
                .map(|()| total)
        }
        None => {
            tracing::debug!(url, "single-stream transfer");
            single::fetch_whole(url, &options.user_agent, &storage, &progress, cancel)
        }
    };

    match result {
        Ok(bytes) => {
            if let Err(e) = storage.sync() {
                return TransferOutcome::Failed(e);
            }
            progress.emit();
            TransferOutcome::Completed { bytes }
        }
        Err(e) if e.is_cancelled() || cancel.is_cancelled() => TransferOutcome::Cancelled,
        Err(e) => TransferOutcome::Failed(anyhow::Error::new(e).context("transfer failed")),
    }
}

/// Ranges for a segmented transfer, or `None` to fall back to a single stream.
fn plan_ranges(url: &str, options: &TransferOptions) -> Option<(u64, Vec<Segment>)> {
    let head = match fetch_head::probe(url, &options.user_agent) {
        Ok(h) => h,
        Err(e) => {
            tracing::debug!(url, "HEAD probe failed, using single stream: {:#}", e);
            return None;
        }
    };
    if !head.supports_segments() {
        return None;
    }
    let total = head.content_length?;
    let segments = plan_segments(total, options.segment_count);
    (segments.len() > 1).then_some((total, segments))
}

/// Fetch all ranges concurrently. Returns `Cancelled` if the job token
/// tripped, otherwise the first real failure in segment order.
fn fetch_segments(
    url: &str,
    user_agent: &str,
    segments: &[Segment],
    storage: &StorageWriter,
    progress: &ProgressCounter,
    cancel: &CancellationToken,
) -> Result<(), SegmentError> {
    // Tripping `abort` stops sibling segments without cancelling the job.
    let abort = cancel.child_token();

    let results: Vec<Result<(), SegmentError>> = std::thread::scope(|s| {
        let handles: Vec<_> = segments
            .iter()
            .map(|seg| {
                let abort = &abort;
                s.spawn(move || {
                    let res = segment::fetch_segment(url, user_agent, seg, storage, progress, abort);
                    if res.is_err() {
                        abort.cancel();
                    }
                    res
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(Err(SegmentError::WorkerPanicked)))
            .collect()
    });

    if cancel.is_cancelled() {
        return Err(SegmentError::Cancelled);
    }

    let mut first_error = None;
    for (index, res) in results.into_iter().enumerate() {
        match res {
            Ok(()) | Err(SegmentError::Cancelled) => {}
            Err(e) => {
                tracing::debug!(url, segment = index, "segment failed: {}", e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
