//! Parse HTTP response header lines into HeadResult.

use super::HeadResult;

/// Parse collected header lines. A status line resets what was seen so far,
/// so after redirects only the final response counts.
pub(crate) fn parse_headers(lines: &[String]) -> HeadResult {
    let mut out = HeadResult::default();

    for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        if line.starts_with("HTTP/") {
            out = HeadResult::default();
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "content-length" => out.content_length = value.parse().ok(),
            "accept-ranges" => out.accept_ranges = value.eq_ignore_ascii_case("bytes"),
            "content-disposition" => out.content_disposition = Some(value.to_string()),
            _ => {}
        }
    }

    out
}
