//! URL helpers and file naming.
//!
//! Derives display names from a URL path or `Content-Disposition`, staging
//! file names from resolver file ids, and reads query parameters of share
//! links.

mod content_disposition;
mod sanitize;

pub use content_disposition::filename_from_content_disposition;
pub use sanitize::sanitize_file_name;

/// Used when neither the URL nor the headers yield a usable name.
pub const DEFAULT_FILENAME: &str = "download.bin";

/// Last non-empty path segment of `url`, percent-decoding left to the caller.
pub fn last_path_segment(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}

/// Value of query parameter `key`, decoded.
pub fn query_value(url: &str, key: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let value = parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned());
    value
}

/// Name to show for a download: `Content-Disposition` first, then the URL path.
///
/// - `derive_filename("https://example.com/archive.zip", None)` → `"archive.zip"`
/// - `derive_filename("https://example.com/", None)` → `"download.bin"`
pub fn derive_filename(url: &str, content_disposition: Option<&str>) -> String {
    let candidate = content_disposition
        .and_then(filename_from_content_disposition)
        .or_else(|| last_path_segment(url));

    candidate
        .map(|c| sanitize_file_name(&c))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

/// Staging file name for a resolver file id; never empty, never a path.
pub fn staging_file_name(file_id: &str) -> String {
    let name = sanitize_file_name(file_id);
    if name.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        name
    }
}
