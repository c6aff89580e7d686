//! One HTTP Range GET written at its segment offset.

use tokio_util::sync::CancellationToken;

use crate::segmenter::Segment;
use crate::storage::StorageWriter;

use super::curl_engine::easy_for;
use super::progress::ProgressCounter;
use super::SegmentError;

/// Fetch `segment` of `url` into `storage`. The server must answer 206 with
/// exactly `segment.len()` bytes; anything else fails the segment.
pub(super) fn fetch_segment(
    url: &str,
    user_agent: &str,
    segment: &Segment,
    storage: &StorageWriter,
    progress: &ProgressCounter,
    cancel: &CancellationToken,
) -> Result<(), SegmentError> {
    let mut easy = easy_for(url, user_agent)?;
    easy.range(&segment.curl_range())?;

    let expected = segment.len();
    let mut received = 0u64;
    let mut overrun: Option<u64> = None;
    let mut storage_error: Option<std::io::Error> = None;

    let perform_result = {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            if cancel.is_cancelled() {
                return Ok(0);
            }
            let len = data.len() as u64;
            // A server ignoring the range would spill into the next segment.
            if received + len > expected {
                overrun = Some(received + len);
                return Ok(0);
            }
            match storage.write_at(segment.start + received, data) {
                Ok(()) => {
                    received += len;
                    progress.add(len);
                    Ok(data.len())
                }
                Err(e) => {
                    storage_error = Some(e);
                    Ok(0)
                }
            }
        })?;
        transfer.progress_function(|_, _, _, _| !cancel.is_cancelled())?;
        transfer.perform()
    };

    if let Err(e) = perform_result {
        if cancel.is_cancelled() {
            return Err(SegmentError::Cancelled);
        }
        if e.is_write_error() {
            if let Some(received) = overrun {
                return Err(SegmentError::PartialTransfer { expected, received });
            }
            if let Some(io_err) = storage_error.take() {
                return Err(SegmentError::Storage(io_err));
            }
        }
        return Err(SegmentError::Curl(e));
    }

    let code = easy.response_code()?;
    if code != 206 {
        return Err(SegmentError::Http(code));
    }
    if received != expected {
        return Err(SegmentError::PartialTransfer { expected, received });
    }
    Ok(())
}
