use linkdock::services::thumbnail::{favicon_url, screenshot_url};

#[test]
fn test_screenshot_url_is_deterministic_and_encoded() {
    let first = screenshot_url("https://example.com/a?b=c");
    let second = screenshot_url("https://example.com/a?b=c");
    assert_eq!(first, second);

    assert!(first.starts_with("https://api.microlink.io/?url="));
    assert!(first.contains("screenshot=true"));
    // The page URL is percent-encoded, never pasted raw
    assert!(first.contains("https%3A%2F%2Fexample.com"));
    assert!(!first.contains("url=https://example.com"));
}

#[test]
fn test_favicon_url_uses_the_host() {
    let favicon = favicon_url("https://docs.example.com/deep/path").unwrap();
    assert_eq!(
        favicon,
        "https://www.google.com/s2/favicons?domain=docs.example.com&sz=128"
    );
}

#[test]
fn test_favicon_url_requires_a_parseable_host() {
    assert_eq!(favicon_url("not a url"), None);
    assert_eq!(favicon_url("mailto:someone@example.com"), None);
}
