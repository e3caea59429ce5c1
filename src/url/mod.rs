//! URL handling module for Manual-Scout
//!
//! This module provides URL canonicalization, domain extraction and
//! excluded-site matching.

mod domain;
mod matcher;
mod normalize;

// Re-export main functions
pub use domain::{extract_domain, same_domain, site_root};
pub use matcher::{is_excluded_site, matches_site_pattern};
pub use normalize::{canonicalize, canonicalize_url, seed_url};
