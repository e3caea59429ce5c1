use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Main configuration structure for Manual-Scout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub search: SearchConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of same-domain page links followed from one page
    #[serde(rename = "max-links-per-page", default = "default_max_links_per_page")]
    pub max_links_per_page: usize,

    /// Timeout for a whole page request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for establishing a connection (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Timeout for the HEAD request used to read a file's declared size (seconds)
    #[serde(rename = "size-probe-timeout-secs", default = "default_size_probe_timeout")]
    pub size_probe_timeout_secs: u64,

    /// Upper bound on seed sites crawled concurrently within one job
    #[serde(rename = "max-site-workers", default = "default_max_site_workers")]
    pub max_site_workers: usize,

    /// Number of discovered files buffered before a flush to the store
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_links_per_page: default_max_links_per_page(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            size_probe_timeout_secs: default_size_probe_timeout(),
            max_site_workers: default_max_site_workers(),
            batch_size: default_batch_size(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Job queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Running jobs older than this are reclaimed as stale (minutes)
    #[serde(rename = "stale-after-minutes", default = "default_stale_after_minutes")]
    pub stale_after_minutes: i64,

    /// How often a worker refreshes its lease (seconds)
    #[serde(rename = "heartbeat-secs", default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// A lease without a heartbeat for this long has no live worker (seconds)
    #[serde(rename = "lease-timeout-secs", default = "default_lease_timeout_secs")]
    pub lease_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            stale_after_minutes: default_stale_after_minutes(),
            heartbeat_secs: default_heartbeat_secs(),
            lease_timeout_secs: default_lease_timeout_secs(),
        }
    }
}

/// Auxiliary search configuration, used when a job names no seed sites
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// HTML search endpoint
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Maximum number of result links read from the search page
    #[serde(rename = "max-results", default = "default_search_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            max_results: default_search_max_results(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// One crawl job definition
///
/// List-valued fields are parsed once here and stored as typed lists; the
/// crawler never re-parses delimited strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobSpec {
    /// Human readable job name
    pub name: String,

    /// Free-text query used for seed discovery when `sites` is empty
    #[serde(default)]
    pub query: Option<String>,

    /// Seed sites in crawl order; empty means "resolve via search"
    #[serde(default)]
    pub sites: Vec<String>,

    /// Inclusion terms; empty matches everything
    #[serde(rename = "search-terms", default)]
    pub search_terms: Vec<String>,

    /// Exclusion terms; omitted means the default exclusion list
    #[serde(rename = "exclude-terms", default = "default_exclude_terms")]
    pub exclude_terms: Vec<String>,

    /// Substrings of domains that are never crawled or emitted
    #[serde(rename = "exclude-sites", default)]
    pub exclude_sites: Vec<String>,

    /// File extensions accepted as candidates (without the leading dot)
    #[serde(rename = "file-extensions", default = "default_file_extensions")]
    pub file_extensions: Vec<String>,

    #[serde(rename = "min-file-size-mb", default)]
    pub min_file_size_mb: Option<f64>,

    #[serde(rename = "max-file-size-mb", default)]
    pub max_file_size_mb: Option<f64>,

    /// Page-count bounds, carried for the downstream PDF pipeline
    #[serde(rename = "min-pages", default)]
    pub min_pages: Option<u32>,

    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,

    /// Maximum page-link hops from a seed
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Whether same-domain page links are followed at all
    #[serde(rename = "follow-links", default = "default_true")]
    pub follow_links: bool,

    /// Start the next queued job when this one finishes
    #[serde(default)]
    pub autostart: bool,

    /// Hold the job as `scheduled` until this time (RFC 3339)
    #[serde(rename = "scheduled-time", default)]
    pub scheduled_time: Option<DateTime<Utc>>,
}

impl JobSpec {
    /// Creates a job with the given name and defaults for everything else
    ///
    /// Unlike a parsed job file, no default exclusion terms are applied.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: None,
            sites: Vec::new(),
            search_terms: Vec::new(),
            exclude_terms: Vec::new(),
            exclude_sites: Vec::new(),
            file_extensions: default_file_extensions(),
            min_file_size_mb: None,
            max_file_size_mb: None,
            min_pages: None,
            max_pages: None,
            max_depth: default_max_depth(),
            follow_links: true,
            autostart: false,
            scheduled_time: None,
        }
    }

    /// Keyword string for seed discovery: the query, or the inclusion terms
    pub fn search_query(&self) -> String {
        match self.query.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => query.to_string(),
            _ => self.search_terms.join(" "),
        }
    }
}

/// Exclusion terms applied when a job file does not list its own
pub fn default_exclude_terms() -> Vec<String> {
    ["preview", "operator", "operation", "user manual", "quick start"]
        .iter()
        .map(|term| term.to_string())
        .collect()
}

fn default_file_extensions() -> Vec<String> {
    vec!["pdf".to_string()]
}

fn default_max_depth() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_max_links_per_page() -> usize {
    20
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_size_probe_timeout() -> u64 {
    10
}

fn default_max_site_workers() -> usize {
    5
}

fn default_batch_size() -> usize {
    25
}

fn default_stale_after_minutes() -> i64 {
    120
}

fn default_heartbeat_secs() -> u64 {
    15
}

fn default_lease_timeout_secs() -> u64 {
    60
}

fn default_search_endpoint() -> String {
    "https://html.duckduckgo.com/html/".to_string()
}

fn default_search_max_results() -> usize {
    20
}
