//! HTTP HEAD probing.
//!
//! Uses the curl crate (libcurl) to learn the size of a resolved file, whether
//! the host serves byte ranges, and the `Content-Disposition` name hint.

mod parse;

pub(crate) use parse::parse_headers;

use anyhow::{Context, Result};
use std::str;
use std::time::Duration;

/// Headers that decide between segmented and single-stream transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadResult {
    /// Total size in bytes, if `Content-Length` is present.
    pub content_length: Option<u64>,
    /// True if the final response sent `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
    /// `Content-Disposition` value if present (filename hint).
    pub content_disposition: Option<String>,
}

impl HeadResult {
    /// True when the file can be split into Range requests.
    pub fn supports_segments(&self) -> bool {
        self.accept_ranges && self.content_length.is_some_and(|n| n > 0)
    }
}

/// Performs a HEAD request and returns parsed metadata.
///
/// Follows redirects; only the headers of the last response are kept.
/// Blocking: call from `spawn_blocking` in async code.
pub fn probe(url: &str, user_agent: &str) -> Result<HeadResult> {
    let mut lines: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.nobody(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.useragent(user_agent)?;
    easy.connect_timeout(Duration::from_secs(15))?;
    easy.timeout(Duration::from_secs(30))?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                lines.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.perform().context("HEAD request failed")?;
    }

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        anyhow::bail!("HEAD {} returned HTTP {}", url, code);
    }

    Ok(parse::parse_headers(&lines))
}
