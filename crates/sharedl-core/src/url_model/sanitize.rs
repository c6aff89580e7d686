//! Filesystem-safe names for staging files.

/// Linux NAME_MAX.
const MAX_NAME_BYTES: usize = 255;

/// Makes `name` safe as a single path component on Linux.
///
/// Separators, NUL, control characters and whitespace become `_` (runs
/// collapsed to one); leading/trailing dots and underscores are trimmed so the
/// result can never be `.` or `..`; the result is cut to 255 bytes on a char
/// boundary. May return an empty string.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let unsafe_char = matches!(c, '/' | '\\' | '\0') || c.is_control() || c.is_whitespace();
        if unsafe_char {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut end = trimmed.len().min(MAX_NAME_BYTES);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}
