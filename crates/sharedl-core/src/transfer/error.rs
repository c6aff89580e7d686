//! Failure of one curl request (a segment or the whole file).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SegmentError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[source] curl::Error),
    /// Non-2xx response, or a plain 200 where a range was requested.
    #[error("HTTP {0}")]
    Http(u32),
    /// Body length did not match what was asked for.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// Writing to the staging file failed (disk full, permissions).
    #[error("storage: {0}")]
    Storage(#[source] std::io::Error),
    /// A segment thread panicked before reporting.
    #[error("segment worker panicked")]
    WorkerPanicked,
    /// The cancellation token tripped mid-request.
    #[error("transfer cancelled")]
    Cancelled,
}

impl SegmentError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SegmentError::Cancelled)
    }
}

impl From<curl::Error> for SegmentError {
    fn from(e: curl::Error) -> Self {
        SegmentError::Curl(e)
    }
}
