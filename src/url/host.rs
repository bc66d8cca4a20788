use url::Url;

/// Extracts the lower-cased host of a URI string
///
/// Returns None if the URI does not parse or has no host (e.g. `mailto:`).
///
/// # Examples
///
/// ```
/// use spider_discovery::url::extract_host;
///
/// assert_eq!(extract_host("https://EXAMPLE.com:8080/a"), Some("example.com".to_string()));
/// assert_eq!(extract_host("mailto:someone@example.com"), None);
/// ```
pub fn extract_host(uri: &str) -> Option<String> {
    let url = Url::parse(uri).ok()?;
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_ascii_lowercase())
}

/// Checks if a host matches a pattern
///
/// Patterns are either an exact host ("example.com") or a wildcard
/// ("*.example.com") that matches the bare domain and any subdomain.
/// Comparison is case-insensitive.
pub fn matches_host_pattern(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => {
            host == base
                || (host.len() > base.len()
                    && host.ends_with(base)
                    && host.as_bytes()[host.len() - base.len() - 1] == b'.')
        }
        None => host == pattern,
    }
}
