//! Thumbnail URL derivation for Linkdock.
//!
//! Screenshot and favicon URLs are computed deterministically from the
//! bookmark URL at creation time and stored with the record, so steady
//! state never needs a backfill. A repair path exists for legacy rows
//! that predate stored thumbnails (see the list manager).

use url::{form_urlencoded, Url};

const SCREENSHOT_ENDPOINT: &str = "https://api.microlink.io/";
const FAVICON_ENDPOINT: &str = "https://www.google.com/s2/favicons";

/// Screenshot-rendering service URL for a page.
///
/// Deterministic: the same page URL always yields the same thumbnail URL.
pub fn screenshot_url(page_url: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(page_url.as_bytes()).collect();
    format!(
        "{}?url={}&screenshot=true&meta=false&embed=screenshot.url",
        SCREENSHOT_ENDPOINT, encoded
    )
}

/// Favicon URL for the bookmark's host, or `None` when the bookmark URL
/// has no parseable host.
pub fn favicon_url(page_url: &str) -> Option<String> {
    let host = Url::parse(page_url).ok()?.host_str()?.to_string();
    Some(format!("{}?domain={}&sz=128", FAVICON_ENDPOINT, host))
}
