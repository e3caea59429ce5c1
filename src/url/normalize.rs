use crate::UrlError;
use url::Url;

/// Query parameters that only carry referral tracking and never select a file
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "source"];

/// Canonicalizes a URL string into the form used as the discovery dedup key
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only HTTP and HTTPS schemes
/// 3. Require a host (lowercased by the parser)
/// 4. Remove the fragment (everything after #)
/// 5. Remove tracking query parameters (`utm_*`, `ref_*`, `fbclid`, ...),
///    keeping the remaining parameters in their original order
/// 6. Remove an empty query string (trailing ?)
///
/// # Examples
///
/// ```
/// use manual_scout::url::canonicalize_url;
///
/// let url = canonicalize_url("https://EXAMPLE.com/manuals/trx450.pdf#page=4").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/manuals/trx450.pdf");
/// ```
pub fn canonicalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize(url)
}

/// Canonicalizes an already-parsed URL (see [`canonicalize_url`])
pub fn canonicalize(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Ok(url)
}

/// Parses a configured seed site, defaulting to HTTPS when no scheme is given
///
/// ```
/// use manual_scout::url::seed_url;
///
/// assert_eq!(seed_url("manualslib.example").unwrap().as_str(), "https://manualslib.example/");
/// assert_eq!(seed_url("http://localhost:8080/atv").unwrap().as_str(), "http://localhost:8080/atv");
/// ```
pub fn seed_url(site: &str) -> Result<Url, UrlError> {
    let site = site.trim();
    if site.is_empty() {
        return Err(UrlError::Malformed("empty seed site".to_string()));
    }

    if site.starts_with("http://") || site.starts_with("https://") {
        canonicalize_url(site)
    } else if site.contains("://") {
        let scheme = site.split("://").next().unwrap_or_default();
        Err(UrlError::InvalidScheme(scheme.to_string()))
    } else {
        canonicalize_url(&format!("https://{}", site))
    }
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    TRACKING_PARAMS.contains(&key.as_str()) || key.starts_with("utm_") || key.starts_with("ref_")
}
