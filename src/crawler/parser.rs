//! HTML link extraction
//!
//! Splits the anchors of a fetched page into two sets:
//! - page links to follow (same domain as the page, not file links)
//! - file links whose path ends with an accepted extension (any domain)

use crate::filter::FilterRules;
use crate::url::{canonicalize, same_domain};
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use url::Url;

/// Number of same-extension file links that marks a page as a directory
pub const DIRECTORY_THRESHOLD: usize = 3;

/// A file link and the visible text of its anchor
#[derive(Debug, Clone, PartialEq)]
pub struct FileLink {
    pub url: Url,
    pub text: String,
}

/// Links extracted from one HTML page
#[derive(Debug, Clone, Default)]
pub struct ExtractedLinks {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Same-domain links to follow, canonical and in document order
    pub page_links: Vec<Url>,

    /// Links whose path matches an accepted extension, in document order
    pub file_links: Vec<FileLink>,

    /// True when the page lists at least `DIRECTORY_THRESHOLD` file links
    /// sharing one extension
    pub is_directory: bool,
}

/// Parses HTML content and extracts page and file links
///
/// # Link Extraction Rules
///
/// - Only `<a href="...">` anchors are considered
/// - `javascript:`, `mailto:`, `tel:`, `data:` and fragment-only links are skipped
/// - Relative links are resolved against `base_url`
/// - Results are canonicalized (fragment and tracking parameters removed)
///   and deduplicated, keeping the first occurrence
/// - A link matching an accepted extension is a file link and never a page link
///
/// Malformed HTML is parsed leniently; a page without usable anchors simply
/// yields empty sets.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The URL the page was fetched from
/// * `rules` - Filter rules supplying the accepted extensions
///
/// # Example
///
/// ```
/// use manual_scout::crawler::extract_links;
/// use manual_scout::filter::FilterRules;
/// use url::Url;
///
/// let html = r#"<a href="/manuals/">Manuals</a><a href="trx450.pdf">TRX450</a>"#;
/// let base = Url::parse("https://example.com/honda/").unwrap();
/// let links = extract_links(html, &base, &FilterRules::new(&["pdf"]));
///
/// assert_eq!(links.page_links[0].as_str(), "https://example.com/manuals/");
/// assert_eq!(links.file_links[0].url.as_str(), "https://example.com/honda/trx450.pdf");
/// assert_eq!(links.file_links[0].text, "TRX450");
/// ```
pub fn extract_links(html: &str, base_url: &Url, rules: &FilterRules) -> ExtractedLinks {
    let document = Html::parse_document(html);
    let mut extracted = ExtractedLinks {
        title: extract_title(&document),
        ..ExtractedLinks::default()
    };

    let Ok(selector) = Selector::parse("a[href]") else {
        return extracted;
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut per_extension: HashMap<String, usize> = HashMap::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_link(href, base_url) else {
            continue;
        };
        if !seen.insert(url.as_str().to_string()) {
            continue;
        }

        if let Some(ext) = rules.extension_of(&url) {
            *per_extension.entry(ext.to_string()).or_default() += 1;
            let text = collapse_whitespace(&element.text().collect::<String>());
            extracted.file_links.push(FileLink { url, text });
        } else if same_domain(&url, base_url) {
            extracted.page_links.push(url);
        }
    }

    extracted.is_directory = per_extension
        .values()
        .any(|count| *count >= DIRECTORY_THRESHOLD);

    extracted
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

/// Resolves a link href to a canonical absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only anchors
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    canonicalize(absolute).ok()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/manuals/index.html").unwrap()
    }

    fn pdf_rules() -> FilterRules {
        FilterRules::new(&["pdf"])
    }

    fn links(html: &str) -> ExtractedLinks {
        extract_links(html, &base_url(), &pdf_rules())
    }

    #[test]
    fn test_extract_title() {
        let parsed = links("<html><head><title>  ATV   Manuals </title></head></html>");
        assert_eq!(parsed.title, Some("ATV Manuals".to_string()));
    }

    #[test]
    fn test_relative_links_resolved() {
        let parsed = links(r#"<a href="honda/">Honda</a><a href="/about">About</a>"#);
        let urls: Vec<&str> = parsed.page_links.iter().map(Url::as_str).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/manuals/honda/",
                "https://example.com/about"
            ]
        );
    }

    #[test]
    fn test_cross_domain_pages_dropped() {
        let parsed = links(r#"<a href="https://other.com/page">Elsewhere</a>"#);
        assert!(parsed.page_links.is_empty());
    }

    #[test]
    fn test_cross_domain_files_kept() {
        let parsed = links(r#"<a href="https://cdn.other.com/m/trx.pdf">TRX</a>"#);
        assert_eq!(parsed.file_links.len(), 1);
        assert_eq!(
            parsed.file_links[0].url.as_str(),
            "https://cdn.other.com/m/trx.pdf"
        );
    }

    #[test]
    fn test_file_link_not_page_link() {
        let parsed = links(r#"<a href="a.PDF">A</a>"#);
        assert_eq!(parsed.file_links.len(), 1);
        assert!(parsed.page_links.is_empty());
    }

    #[test]
    fn test_fragments_stripped_and_deduplicated() {
        let parsed = links(
            r#"<a href="/p#top">One</a><a href="/p#bottom">Two</a>
               <a href="a.pdf#page=2">A</a><a href="a.pdf">A again</a>"#,
        );
        assert_eq!(parsed.page_links.len(), 1);
        assert_eq!(parsed.page_links[0].as_str(), "https://example.com/p");
        assert_eq!(parsed.file_links.len(), 1);
        assert_eq!(parsed.file_links[0].text, "A");
    }

    #[test]
    fn test_skips_special_schemes() {
        let parsed = links(
            r##"<a href="javascript:void(0)">x</a><a href="mailto:a@b.c">x</a>
                <a href="tel:+15551234">x</a><a href="data:text/html,hi">x</a>
                <a href="#section">x</a><a href="ftp://example.com/m.pdf">x</a>"##,
        );
        assert!(parsed.page_links.is_empty());
        assert!(parsed.file_links.is_empty());
    }

    #[test]
    fn test_anchor_text_trimmed() {
        let parsed = links("<a href=\"m.pdf\">\n  Service\n  Manual  </a>");
        assert_eq!(parsed.file_links[0].text, "Service Manual");
    }

    #[test]
    fn test_directory_flag() {
        let two = links(r#"<a href="a.pdf">a</a><a href="b.pdf">b</a>"#);
        assert!(!two.is_directory);

        let three = links(r#"<a href="a.pdf">a</a><a href="b.pdf">b</a><a href="c.pdf">c</a>"#);
        assert!(three.is_directory);
    }

    #[test]
    fn test_directory_counts_per_extension() {
        let rules = FilterRules::new(&["pdf", "zip"]);
        let parsed = extract_links(
            r#"<a href="a.pdf">a</a><a href="b.pdf">b</a><a href="c.zip">c</a>"#,
            &base_url(),
            &rules,
        );
        assert_eq!(parsed.file_links.len(), 3);
        assert!(!parsed.is_directory);
    }

    #[test]
    fn test_malformed_html_is_lenient() {
        let parsed = links("<html><body><a href=\"/ok\">ok<div><a href=");
        assert_eq!(parsed.page_links.len(), 1);
    }

    #[test]
    fn test_port_confines_pages() {
        let base = Url::parse("http://127.0.0.1:8080/").unwrap();
        let parsed = extract_links(
            r#"<a href="http://127.0.0.1:9090/x">x</a><a href="/y">y</a>"#,
            &base,
            &pdf_rules(),
        );
        assert_eq!(parsed.page_links.len(), 1);
        assert_eq!(parsed.page_links[0].as_str(), "http://127.0.0.1:8080/y");
    }
}
