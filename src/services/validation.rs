//! Submit-time URL validation for Linkdock.
//!
//! Mirrors what the dashboard form accepts: a bare domain is promoted to
//! `https://`, and the host must look like a real public hostname — it
//! contains a dot and its final label is at least two characters long.

use url::Url;

/// Normalizes user URL input to a scheme-prefixed absolute URL.
///
/// Returns `None` when the input cannot be made into a URL with an
/// acceptable host. The accepted value is returned exactly as formatted
/// (no trailing-slash or case rewriting beyond trimming).
pub fn normalize_url(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let formatted = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let parsed = Url::parse(&formatted).ok()?;
    let host = parsed.host_str()?;

    if !host.contains('.') {
        return None;
    }
    let last_label = host.rsplit('.').next()?;
    if last_label.len() < 2 {
        return None;
    }

    Some(formatted)
}
