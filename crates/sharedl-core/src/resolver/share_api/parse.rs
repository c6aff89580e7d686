//! Share codes and the JSON bodies of the share API.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

use crate::url_model::{last_path_segment, query_value};

/// Share code of a link: `surl` query parameter with a leading `1`, or a last
/// path segment that already starts with `1` (`/s/1AbC...`).
pub(super) fn share_code(url: &str) -> Option<String> {
    if let Some(surl) = query_value(url, "surl").filter(|s| !s.is_empty()) {
        return Some(format!("1{}", surl));
    }
    last_path_segment(url).filter(|s| s.starts_with('1'))
}

#[derive(Debug, Deserialize)]
pub(super) struct ShareInfo {
    pub shareid: i64,
    pub uk: i64,
    pub sign: String,
    pub timestamp: i64,
    #[serde(default)]
    pub list: Vec<ShareEntry>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ShareEntry {
    pub filename: String,
    #[serde(deserialize_with = "string_or_number")]
    pub fs_id: String,
}

#[derive(Debug, Serialize)]
pub(super) struct DownloadRequest<'a> {
    pub shareid: i64,
    pub uk: i64,
    pub sign: &'a str,
    pub timestamp: i64,
    pub fs_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct DownloadLink {
    #[serde(rename = "downloadLink")]
    download_link: String,
}

/// `fs_id` arrives as either a JSON string or a number.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(u64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}

pub(super) fn decode_share_info(body: &[u8]) -> Result<ShareInfo> {
    serde_json::from_slice(body).context("invalid share info response")
}

pub(super) fn decode_download_link(body: &[u8]) -> Result<String> {
    let link: DownloadLink =
        serde_json::from_slice(body).context("invalid download link response")?;
    if link.download_link.trim().is_empty() {
        anyhow::bail!("empty download link");
    }
    Ok(link.download_link)
}
