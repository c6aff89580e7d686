//! Single-stream GET, written sequentially from offset 0.

use std::cell::RefCell;

use tokio_util::sync::CancellationToken;

use crate::fetch_head::parse_headers;
use crate::storage::StorageWriter;

use super::curl_engine::easy_for;
use super::progress::ProgressCounter;
use super::SegmentError;

/// Fetch `url` in one request. The total is taken from the final response's
/// `Content-Length` when present and checked against the bytes written.
pub(super) fn fetch_whole(
    url: &str,
    user_agent: &str,
    storage: &StorageWriter,
    progress: &ProgressCounter,
    cancel: &CancellationToken,
) -> Result<u64, SegmentError> {
    let mut easy = easy_for(url, user_agent)?;

    let header_lines: RefCell<Vec<String>> = RefCell::new(Vec::new());
    let mut written = 0u64;
    let mut storage_error: Option<std::io::Error> = None;

    let perform_result = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = std::str::from_utf8(data) {
                header_lines.borrow_mut().push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.write_function(|data| {
            if cancel.is_cancelled() {
                return Ok(0);
            }
            if !progress.has_begun() {
                progress.begin(parse_headers(&header_lines.borrow()).content_length);
            }
            match storage.write_at(written, data) {
                Ok(()) => {
                    written += data.len() as u64;
                    progress.add(data.len() as u64);
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
            if let Some(io_err) = storage_error.take() {
                return Err(SegmentError::Storage(io_err));
            }
        }
        return Err(SegmentError::Curl(e));
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(SegmentError::Http(code));
    }

    let head = parse_headers(&header_lines.borrow());
    if !progress.has_begun() {
        progress.begin(head.content_length);
    }
    if let Some(expected) = head.content_length {
        if expected != written {
            return Err(SegmentError::PartialTransfer {
                expected,
                received: written,
            });
        }
    }
    Ok(written)
}
