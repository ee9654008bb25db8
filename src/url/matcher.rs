/// Checks if a host matches a host pattern
///
/// Two pattern forms are supported:
/// 1. Exact: "streamable.com" matches only "streamable.com"
/// 2. Wildcard: "*.imgur.com" matches "imgur.com", "i.imgur.com" and any
///    deeper subdomain
///
/// Comparison is ASCII case-insensitive; hosts taken from `url::Url` are
/// already lowercase.
///
/// # Examples
///
/// ```
/// use feed_harvest::url::matches_host;
///
/// assert!(matches_host("*.imgur.com", "i.imgur.com"));
/// assert!(matches_host("*.imgur.com", "imgur.com"));
/// assert!(!matches_host("*.imgur.com", "notimgur.com"));
/// assert!(matches_host("streamable.com", "streamable.com"));
/// ```
pub fn matches_host(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => {
            if host == base {
                return true;
            }
            // The subdomain boundary must be a dot, so "myimgur.com" stays out
            host.len() > base.len()
                && host.ends_with(base)
                && host.as_bytes()[host.len() - base.len() - 1] == b'.'
        }
        None => host == pattern,
    }
}

/// Returns true if the host matches any of the patterns
pub fn matches_any_host(patterns: &[String], host: &str) -> bool {
    patterns.iter().any(|pattern| matches_host(pattern, host))
}
