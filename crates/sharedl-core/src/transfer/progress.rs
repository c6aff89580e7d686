//! Byte counter shared by the curl callbacks of one transfer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::{ProgressSnapshot, TransferEvent};

/// Minimum spacing between two `Progress` events from the engine.
pub(super) const EMIT_INTERVAL: Duration = Duration::from_millis(250);

/// Span over which `bytes_per_sec` is measured.
const RATE_WINDOW: Duration = Duration::from_secs(1);

const UNKNOWN_TOTAL: u64 = u64::MAX;

/// Byte count at the start of the current rate window.
struct RateSample {
    at: Instant,
    bytes: u64,
    per_sec: u64,
}

/// Counts received bytes across all segment threads and turns them into
/// `TransferEvent`s. Sends are `try_send`; a full channel drops the event.
pub(super) struct ProgressCounter {
    received: AtomicU64,
    total: AtomicU64,
    started: AtomicBool,
    /// Milliseconds since `start` of the last emitted snapshot.
    last_emit_ms: AtomicU64,
    start: Instant,
    rate: Mutex<RateSample>,
    events: mpsc::Sender<TransferEvent>,
}

impl ProgressCounter {
    pub(super) fn new(events: mpsc::Sender<TransferEvent>) -> Self {
        let start = Instant::now();
        Self {
            received: AtomicU64::new(0),
            total: AtomicU64::new(UNKNOWN_TOTAL),
            started: AtomicBool::new(false),
            last_emit_ms: AtomicU64::new(0),
            start,
            rate: Mutex::new(RateSample {
                at: start,
                bytes: 0,
                per_sec: 0,
            }),
            events,
        }
    }

    /// Record the total (if known) and send `Started` once.
    pub(super) fn begin(&self, total_bytes: Option<u64>) {
        if let Some(total) = total_bytes {
            self.total.store(total, Ordering::Relaxed);
        }
        if !self.started.swap(true, Ordering::AcqRel) {
            let mut rate = self.rate.lock().unwrap_or_else(PoisonError::into_inner);
            *rate = RateSample {
                at: Instant::now(),
                bytes: self.received(),
                per_sec: 0,
            };
            drop(rate);
            let _ = self.events.try_send(TransferEvent::Started { total_bytes });
        }
    }

    pub(super) fn has_begun(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Count `n` new bytes and emit a snapshot if the interval has passed.
    pub(super) fn add(&self, n: u64) {
        self.received.fetch_add(n, Ordering::Relaxed);

        let now_ms = self.start.elapsed().as_millis() as u64;
        let last = self.last_emit_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) < EMIT_INTERVAL.as_millis() as u64 {
            return;
        }
        // Only one thread wins the slot for this interval.
        if self
            .last_emit_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.emit();
        }
    }

    /// Send the current snapshot regardless of the interval.
    pub(super) fn emit(&self) {
        let _ = self.events.try_send(TransferEvent::Progress(self.snapshot()));
    }

    pub(super) fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub(super) fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_at(Instant::now())
    }

    /// Snapshot as of `now`. The rate covers the bytes received during the
    /// last closed window of at least `RATE_WINDOW`.
    fn snapshot_at(&self, now: Instant) -> ProgressSnapshot {
        let bytes_received = self.received();
        let total = self.total.load(Ordering::Relaxed);
        let bytes_per_sec = {
            let mut rate = self.rate.lock().unwrap_or_else(PoisonError::into_inner);
            let elapsed = now.saturating_duration_since(rate.at);
            if elapsed >= RATE_WINDOW {
                let delta = bytes_received.saturating_sub(rate.bytes);
                rate.per_sec = (delta as f64 / elapsed.as_secs_f64()) as u64;
                rate.at = now;
                rate.bytes = bytes_received;
            }
            rate.per_sec
        };
        ProgressSnapshot {
            bytes_received,
            total_bytes: (total != UNKNOWN_TOTAL).then_some(total),
            bytes_per_sec,
        }
    }
}
