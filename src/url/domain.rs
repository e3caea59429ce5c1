use url::Url;

/// Extracts the domain from a URL
///
/// The domain is the lowercase host followed by the port when the URL names
/// a non-default one, so `http://127.0.0.1:8080/` and `http://127.0.0.1:9090/`
/// are different sites. If the URL has no host, returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use manual_scout::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://localhost:8080/manuals/").unwrap();
/// assert_eq!(extract_domain(&url), Some("localhost:8080".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Returns true if both URLs belong to the same domain (host and port)
pub fn same_domain(a: &Url, b: &Url) -> bool {
    match (extract_domain(a), extract_domain(b)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

/// Returns the root of the site a URL belongs to (`scheme://domain/`)
pub fn site_root(url: &Url) -> Option<Url> {
    let domain = extract_domain(url)?;
    Url::parse(&format!("{}://{}/", url.scheme(), domain)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_subdomain() {
        let url = Url::parse("https://manuals.example.com/atv").unwrap();
        assert_eq!(
            extract_domain(&url),
            Some("manuals.example.com".to_string())
        );
    }

    #[test]
    fn test_extract_keeps_explicit_port() {
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com:8080".to_string()));
    }

    #[test]
    fn test_extract_drops_default_port() {
        let url = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_mixed_case() {
        let url = Url::parse("https://Example.COM/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_same_domain() {
        let a = Url::parse("https://example.com/a").unwrap();
        let b = Url::parse("https://example.com/b/c?x=1").unwrap();
        let c = Url::parse("https://other.com/a").unwrap();
        let d = Url::parse("https://example.com:8443/a").unwrap();
        assert!(same_domain(&a, &b));
        assert!(!same_domain(&a, &c));
        assert!(!same_domain(&a, &d));
    }

    #[test]
    fn test_site_root() {
        let url = Url::parse("http://127.0.0.1:4000/manuals/honda?page=2").unwrap();
        assert_eq!(
            site_root(&url).unwrap().as_str(),
            "http://127.0.0.1:4000/"
        );
    }
}
