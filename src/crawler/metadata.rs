//! Best-effort metadata inference for discovered files
//!
//! Everything here is a heuristic over the link text and URL path. A miss
//! leaves the field empty; nothing in this module can fail.

use crate::storage::FileMetadata;
use crate::url::extract_domain;
use url::Url;

/// Brands recognized in titles and paths, matched case-insensitively
const BRANDS: &[&str] = &[
    "honda",
    "yamaha",
    "polaris",
    "suzuki",
    "kawasaki",
    "can-am",
    "toro",
    "craftsman",
    "john deere",
    "husqvarna",
    "kubota",
    "massey ferguson",
    "new holland",
    "generac",
    "champion",
    "westinghouse",
];

/// Equipment keywords, most specific first
const EQUIPMENT_TYPES: &[(&str, &str)] = &[
    ("side by side", "UTV"),
    ("riding mower", "Riding Mower"),
    ("push mower", "Push Mower"),
    ("zero turn", "Zero Turn Mower"),
    ("lawn mower", "Lawn Mower"),
    ("compact tractor", "Compact Tractor"),
    ("farm tractor", "Farm Tractor"),
    ("tractor", "Tractor"),
    ("portable generator", "Portable Generator"),
    ("inverter generator", "Inverter Generator"),
    ("generator", "Generator"),
    ("atv", "ATV"),
    ("quad", "ATV"),
    ("utv", "UTV"),
];

/// Infers manufacturer, model, year and equipment type for a file link
///
/// # Arguments
///
/// * `url` - The canonical file URL
/// * `title` - The candidate title (link text or fallback)
///
/// # Example
///
/// ```
/// use manual_scout::crawler::infer_metadata;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/honda/trx450r.pdf").unwrap();
/// let meta = infer_metadata(&url, "Honda TRX450R ATV Service Manual 2004");
///
/// assert_eq!(meta.manufacturer.as_deref(), Some("Honda"));
/// assert_eq!(meta.model.as_deref(), Some("TRX450R"));
/// assert_eq!(meta.year, Some(2004));
/// assert_eq!(meta.equipment_type.as_deref(), Some("ATV"));
/// ```
pub fn infer_metadata(url: &Url, title: &str) -> FileMetadata {
    let title_lower = title.to_lowercase();
    let path_text = url.path().to_lowercase().replace(['/', '-', '_', '.'], " ");

    FileMetadata {
        equipment_type: find_equipment_type(&title_lower)
            .or_else(|| find_equipment_type(&path_text)),
        manufacturer: find_brand(&title_lower).or_else(|| find_brand(&url.path().to_lowercase())),
        model: find_model(url),
        year: find_year(title),
    }
}

/// Title for a candidate: the link text, else the last path segment, else
/// `"PDF from <domain>"`
pub fn candidate_title(text: &str, url: &Url) -> String {
    let text = text.trim();
    if !text.is_empty() {
        return text.to_string();
    }

    if let Some(segment) = last_segment(url) {
        return segment.to_string();
    }

    format!(
        "PDF from {}",
        extract_domain(url).unwrap_or_else(|| "unknown site".to_string())
    )
}

fn last_segment(url: &Url) -> Option<&str> {
    url.path_segments()?
        .rev()
        .find(|segment| !segment.is_empty())
}

fn find_brand(haystack: &str) -> Option<String> {
    BRANDS
        .iter()
        .find(|brand| haystack.contains(*brand))
        .map(|brand| title_case(brand))
}

fn find_equipment_type(haystack: &str) -> Option<String> {
    EQUIPMENT_TYPES
        .iter()
        .find(|(keyword, _)| contains_word(haystack, keyword))
        .map(|(_, label)| label.to_string())
}

/// A standalone `19xx`/`20xx` token
fn find_year(title: &str) -> Option<i32> {
    title
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .find(|token| {
            token.len() == 4
                && token.chars().all(|c| c.is_ascii_digit())
                && (token.starts_with("19") || token.starts_with("20"))
        })
        .and_then(|token| token.parse().ok())
}

/// The last path segment shaped like two or more letters followed by a
/// digit, upper-cased and without its file extension
fn find_model(url: &Url) -> Option<String> {
    let segments = url.path_segments()?;
    segments
        .filter(|segment| looks_like_model(segment))
        .last()
        .map(|segment| {
            let stem = match segment.rsplit_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem,
                _ => segment,
            };
            stem.to_uppercase()
        })
}

fn looks_like_model(segment: &str) -> bool {
    let letters = segment
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .count();
    letters >= 2
        && segment
            .chars()
            .nth(letters)
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false)
}

/// Substring match that must start and end on a word boundary
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.map(char::is_alphanumeric).unwrap_or(false)
            && !after.map(char::is_alphanumeric).unwrap_or(false)
    })
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut upper_next = true;
    for c in text.chars() {
        if upper_next {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        upper_next = !c.is_alphanumeric();
    }
    out
}
