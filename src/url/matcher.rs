/// Checks if a domain matches an excluded-site pattern
///
/// Patterns are matched as case-insensitive substrings of the domain, so
/// `"ebay"` excludes `www.ebay.com` and `ebay.co.uk`. A leading `*.` is
/// accepted for compatibility with wildcard-style entries and ignored.
///
/// # Examples
///
/// ```
/// use manual_scout::url::matches_site_pattern;
///
/// assert!(matches_site_pattern("ebay", "www.ebay.com"));
/// assert!(matches_site_pattern("*.scribd.com", "de.scribd.com"));
/// assert!(!matches_site_pattern("scribd.com", "example.com"));
/// ```
pub fn matches_site_pattern(pattern: &str, domain: &str) -> bool {
    let pattern = pattern.trim().to_lowercase();
    let pattern = pattern.strip_prefix("*.").unwrap_or(&pattern);
    if pattern.is_empty() {
        return false;
    }
    domain.to_lowercase().contains(pattern)
}

/// Returns true if the domain matches any of the excluded-site patterns
pub fn is_excluded_site(domain: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|pattern| matches_site_pattern(pattern, domain))
}
