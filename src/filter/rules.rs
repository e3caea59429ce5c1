use crate::config::JobSpec;
use crate::filter::probe::SizeProbe;
use crate::url::{extract_domain, is_excluded_site};
use thiserror::Error;
use url::Url;

/// Why a candidate was not emitted
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("extension not accepted")]
    Extension,

    #[error("site excluded by pattern match on '{0}'")]
    ExcludedSite(String),

    #[error("matched exclusion term '{0}'")]
    ExcludedTerm(String),

    #[error("no inclusion term matched")]
    NoSearchTerm,

    #[error("declared size {size_mb:.2} MB outside bounds")]
    Size { size_mb: f64 },
}

/// Typed filter configuration for one crawl job
///
/// Terms and extensions are normalized to lowercase once at construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterRules {
    extensions: Vec<String>,
    search_terms: Vec<String>,
    exclude_terms: Vec<String>,
    exclude_sites: Vec<String>,
    min_size_mb: Option<f64>,
    max_size_mb: Option<f64>,
}

impl FilterRules {
    /// Creates rules that accept any file with one of the given extensions
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Self {
        Self {
            extensions: normalize_extensions(extensions),
            ..Self::default()
        }
    }

    /// Builds the rules described by a job definition
    pub fn from_job(spec: &JobSpec) -> Self {
        Self::new(&spec.file_extensions)
            .with_search_terms(&spec.search_terms)
            .with_exclude_terms(&spec.exclude_terms)
            .with_exclude_sites(&spec.exclude_sites)
            .with_size_bounds(spec.min_file_size_mb, spec.max_file_size_mb)
    }

    pub fn with_search_terms<S: AsRef<str>>(mut self, terms: &[S]) -> Self {
        self.search_terms = normalize_terms(terms);
        self
    }

    pub fn with_exclude_terms<S: AsRef<str>>(mut self, terms: &[S]) -> Self {
        self.exclude_terms = normalize_terms(terms);
        self
    }

    pub fn with_exclude_sites<S: AsRef<str>>(mut self, patterns: &[S]) -> Self {
        self.exclude_sites = normalize_terms(patterns);
        self
    }

    pub fn with_size_bounds(mut self, min_mb: Option<f64>, max_mb: Option<f64>) -> Self {
        self.min_size_mb = min_mb;
        self.max_size_mb = max_mb;
        self
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Returns true if the URL path ends with an accepted extension
    ///
    /// Only the path is inspected, so `/get.php?file=m.pdf` does not match.
    pub fn matches_extension(&self, url: &Url) -> bool {
        self.extension_of(url).is_some()
    }

    /// Returns the accepted extension the URL path ends with, if any
    pub fn extension_of(&self, url: &Url) -> Option<&str> {
        let path = url.path().to_lowercase();
        self.extensions
            .iter()
            .find(|ext| {
                path.strip_suffix(ext.as_str())
                    .map(|rest| rest.ends_with('.') && rest.len() > 1)
                    .unwrap_or(false)
            })
            .map(String::as_str)
    }

    /// Returns true if any inclusion term appears in the URL or link text
    ///
    /// An empty inclusion list matches everything.
    pub fn matches_search_terms(&self, url: &str, text: &str) -> bool {
        if self.search_terms.is_empty() {
            return true;
        }
        let haystack = haystack(url, text);
        self.search_terms.iter().any(|term| haystack.contains(term))
    }

    /// Returns the first exclusion term found in the URL or link text
    pub fn matching_exclude_term(&self, url: &str, text: &str) -> Option<&str> {
        if self.exclude_terms.is_empty() {
            return None;
        }
        let haystack = haystack(url, text);
        self.exclude_terms
            .iter()
            .find(|term| haystack.contains(term.as_str()))
            .map(String::as_str)
    }

    /// Returns true if the domain matches an excluded-site pattern
    pub fn is_excluded_domain(&self, domain: &str) -> bool {
        is_excluded_site(domain, &self.exclude_sites)
    }

    /// Returns true if either size bound is configured
    pub fn has_size_bounds(&self) -> bool {
        self.min_size_mb.is_some() || self.max_size_mb.is_some()
    }

    /// Checks a declared size against the bounds; unknown size passes
    pub fn size_within_bounds(&self, size_mb: Option<f64>) -> bool {
        let Some(size) = size_mb else {
            return true;
        };
        if let Some(min) = self.min_size_mb {
            if size < min {
                return false;
            }
        }
        if let Some(max) = self.max_size_mb {
            if size > max {
                return false;
            }
        }
        true
    }

    /// Applies every rule that needs no network access
    ///
    /// # Arguments
    ///
    /// * `url` - The canonical candidate URL
    /// * `text` - Visible text of the link (may be empty)
    pub fn check_static(&self, url: &Url, text: &str) -> Result<(), Rejection> {
        if !self.matches_extension(url) {
            return Err(Rejection::Extension);
        }

        if let Some(domain) = extract_domain(url) {
            if self.is_excluded_domain(&domain) {
                return Err(Rejection::ExcludedSite(domain));
            }
        }

        if let Some(term) = self.matching_exclude_term(url.as_str(), text) {
            return Err(Rejection::ExcludedTerm(term.to_string()));
        }

        if !self.matches_search_terms(url.as_str(), text) {
            return Err(Rejection::NoSearchTerm);
        }

        Ok(())
    }

    /// Applies all rules, probing the declared size only when the static
    /// rules pass and a size bound is configured
    pub async fn evaluate(
        &self,
        url: &Url,
        text: &str,
        probe: &dyn SizeProbe,
    ) -> Result<(), Rejection> {
        self.check_static(url, text)?;

        if self.has_size_bounds() {
            let size_mb = probe.size_mb(url).await;
            if !self.size_within_bounds(size_mb) {
                return Err(Rejection::Size {
                    size_mb: size_mb.unwrap_or_default(),
                });
            }
        }

        Ok(())
    }
}

fn haystack(url: &str, text: &str) -> String {
    format!("{} {}", url, text).to_lowercase()
}

fn normalize_terms<S: AsRef<str>>(terms: &[S]) -> Vec<String> {
    terms
        .iter()
        .map(|term| term.as_ref().trim().to_lowercase())
        .filter(|term| !term.is_empty())
        .collect()
}

fn normalize_extensions<S: AsRef<str>>(extensions: &[S]) -> Vec<String> {
    extensions
        .iter()
        .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProbe {
        size_mb: Option<f64>,
        calls: AtomicUsize,
    }

    impl FixedProbe {
        fn new(size_mb: Option<f64>) -> Self {
            Self {
                size_mb,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SizeProbe for FixedProbe {
        async fn size_mb(&self, _url: &Url) -> Option<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.size_mb
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_extension_on_path_only() {
        let rules = FilterRules::new(&["pdf"]);
        assert!(rules.matches_extension(&url("https://example.com/m/TRX450.PDF")));
        assert!(rules.matches_extension(&url("https://example.com/m.pdf?dl=1")));
        assert!(!rules.matches_extension(&url("https://example.com/get?file=m.pdf")));
        assert!(!rules.matches_extension(&url("https://example.com/pdf")));
        assert!(!rules.matches_extension(&url("https://example.com/manual.pdfx")));
    }

    #[test]
    fn test_extension_with_leading_dot() {
        let rules = FilterRules::new(&[".PDF", "zip"]);
        assert_eq!(rules.extensions(), &["pdf".to_string(), "zip".to_string()]);
        assert_eq!(
            rules.extension_of(&url("https://example.com/a.zip")),
            Some("zip")
        );
    }

    #[test]
    fn test_empty_search_terms_match_everything() {
        let rules = FilterRules::new(&["pdf"]);
        assert!(rules.matches_search_terms("https://example.com/x.pdf", ""));
    }

    #[test]
    fn test_search_terms_in_url_or_text() {
        let rules = FilterRules::new(&["pdf"]).with_search_terms(&["Service Manual"]);
        assert!(rules.matches_search_terms("https://example.com/a.pdf", "Honda SERVICE manual"));
        assert!(rules.matches_search_terms("https://example.com/service manual.pdf", ""));
        assert!(!rules.matches_search_terms("https://example.com/a.pdf", "Parts list"));
    }

    #[test]
    fn test_exclusion_beats_inclusion() {
        let rules = FilterRules::new(&["pdf"])
            .with_search_terms(&["manual"])
            .with_exclude_terms(&["quick start"]);
        let result = rules.check_static(
            &url("https://example.com/b.pdf"),
            "Quick Start manual B",
        );
        assert_eq!(result, Err(Rejection::ExcludedTerm("quick start".to_string())));
    }

    #[test]
    fn test_excluded_site_beats_everything() {
        let rules = FilterRules::new(&["pdf"]).with_exclude_sites(&["scribd"]);
        let result = rules.check_static(&url("https://de.scribd.com/service.pdf"), "");
        assert_eq!(result, Err(Rejection::ExcludedSite("de.scribd.com".to_string())));
    }

    #[test]
    fn test_rule_order_extension_first() {
        let rules = FilterRules::new(&["pdf"]).with_exclude_sites(&["example"]);
        assert_eq!(
            rules.check_static(&url("https://example.com/page.html"), ""),
            Err(Rejection::Extension)
        );
    }

    #[test]
    fn test_no_search_term() {
        let rules = FilterRules::new(&["pdf"]).with_search_terms(&["shop manual"]);
        assert_eq!(
            rules.check_static(&url("https://example.com/catalog.pdf"), "Catalog"),
            Err(Rejection::NoSearchTerm)
        );
    }

    #[test]
    fn test_size_bounds() {
        let rules = FilterRules::new(&["pdf"]).with_size_bounds(Some(1.0), Some(10.0));
        assert!(rules.size_within_bounds(None));
        assert!(rules.size_within_bounds(Some(1.0)));
        assert!(rules.size_within_bounds(Some(10.0)));
        assert!(!rules.size_within_bounds(Some(0.5)));
        assert!(!rules.size_within_bounds(Some(10.5)));
    }

    #[test]
    fn test_from_job() {
        let mut spec = JobSpec::new("job");
        spec.search_terms = vec!["  Service Manual ".to_string(), "".to_string()];
        spec.max_file_size_mb = Some(5.0);
        let rules = FilterRules::from_job(&spec);
        assert!(rules.has_size_bounds());
        assert!(rules.matches_search_terms("https://x.com/a.pdf", "service manual"));
    }

    #[tokio::test]
    async fn test_probe_skipped_without_bounds() {
        let rules = FilterRules::new(&["pdf"]);
        let probe = FixedProbe::new(Some(500.0));
        assert!(rules
            .evaluate(&url("https://example.com/a.pdf"), "", &probe)
            .await
            .is_ok());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_probe_skipped_when_terms_reject() {
        let rules = FilterRules::new(&["pdf"])
            .with_exclude_terms(&["preview"])
            .with_size_bounds(Some(1.0), None);
        let probe = FixedProbe::new(Some(5.0));
        let result = rules
            .evaluate(&url("https://example.com/preview.pdf"), "", &probe)
            .await;
        assert!(matches!(result, Err(Rejection::ExcludedTerm(_))));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_size_rejection_and_unknown_size() {
        let rules = FilterRules::new(&["pdf"]).with_size_bounds(Some(1.0), Some(10.0));

        let too_big = FixedProbe::new(Some(25.0));
        assert_eq!(
            rules
                .evaluate(&url("https://example.com/a.pdf"), "", &too_big)
                .await,
            Err(Rejection::Size { size_mb: 25.0 })
        );

        let unknown = FixedProbe::new(None);
        assert!(rules
            .evaluate(&url("https://example.com/a.pdf"), "", &unknown)
            .await
            .is_ok());
        assert_eq!(unknown.calls.load(Ordering::SeqCst), 1);
    }
}
