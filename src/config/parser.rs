use crate::config::types::{Config, JobSpec};
use crate::config::validation::{validate, validate_job_spec};
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use manual_scout::config::load_config;
///
/// let config = load_config(Path::new("scout.toml")).unwrap();
/// println!("Batch size: {}", config.crawler.batch_size);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    // Read the configuration file
    let content = std::fs::read_to_string(path)?;

    // Parse TOML
    let config: Config = toml::from_str(&content)?;

    // Validate the configuration
    validate(&config)?;

    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Loads and validates a crawl job definition
///
/// # Arguments
///
/// * `path` - Path to the job's TOML file
///
/// # Returns
///
/// * `Ok(JobSpec)` - The validated job definition
/// * `Err(ConfigError)` - Failed to read, parse, or validate the job
pub fn load_job_spec(path: &Path) -> Result<JobSpec, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_job_spec(&content)
}

/// Parses and validates a crawl job definition from TOML text
pub fn parse_job_spec(content: &str) -> Result<JobSpec, ConfigError> {
    let spec: JobSpec = toml::from_str(content)?;
    validate_job_spec(&spec)?;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_exclude_terms;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID_CONFIG: &str = r#"
[crawler]
max-links-per-page = 15
max-site-workers = 3
batch-size = 10

[user-agent]
crawler-name = "ManualScout"
crawler-version = "0.3"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[queue]
stale-after-minutes = 90
heartbeat-secs = 10

[output]
database-path = "./scout.db"
"#;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_links_per_page, 15);
        assert_eq!(config.crawler.max_site_workers, 3);
        assert_eq!(config.crawler.batch_size, 10);
        assert_eq!(config.crawler.request_timeout_secs, 30);
        assert_eq!(config.queue.stale_after_minutes, 90);
        assert_eq!(config.queue.heartbeat_secs, 10);
        assert_eq!(config.queue.lease_timeout_secs, 60);
        assert_eq!(config.user_agent.crawler_name, "ManualScout");
        assert_eq!(config.search.endpoint, "https://html.duckduckgo.com/html/");
    }

    #[test]
    fn test_optional_sections_default() {
        let config_content = r#"
[user-agent]
crawler-name = "ManualScout"
crawler-version = "0.3"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./scout.db"
"#;
        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_links_per_page, 20);
        assert_eq!(config.crawler.max_site_workers, 5);
        assert_eq!(config.queue.stale_after_minutes, 120);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/scout.toml"));
        assert!(matches!(result.unwrap_err(), ConfigError::Io(_)));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = VALID_CONFIG.replace("batch-size = 10", "batch-size = 0");
        let file = create_temp_config(&content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_parse_job_spec_full() {
        let spec = parse_job_spec(
            r#"
name = "Honda ATV"
query = "honda atv service manual"
sites = ["https://manuals.example.com/", "atv.example.org"]
search-terms = ["service manual", "shop manual"]
exclude-terms = ["quick start"]
exclude-sites = ["ebay"]
file-extensions = ["pdf", "zip"]
min-file-size-mb = 0.5
max-file-size-mb = 80.0
min-pages = 5
max-depth = 3
follow-links = false
autostart = true
scheduled-time = "2026-03-01T08:00:00Z"
"#,
        )
        .unwrap();

        assert_eq!(spec.name, "Honda ATV");
        assert_eq!(spec.sites.len(), 2);
        assert_eq!(spec.exclude_terms, vec!["quick start".to_string()]);
        assert_eq!(spec.file_extensions, vec!["pdf", "zip"]);
        assert_eq!(spec.min_pages, Some(5));
        assert_eq!(spec.max_pages, None);
        assert_eq!(spec.max_depth, 3);
        assert!(!spec.follow_links);
        assert!(spec.autostart);
        assert!(spec.scheduled_time.is_some());
    }

    #[test]
    fn test_parse_job_spec_defaults() {
        let spec = parse_job_spec("name = \"Minimal\"\nsites = [\"example.com\"]").unwrap();

        assert_eq!(spec.sites, vec!["example.com".to_string()]);
        assert_eq!(spec.exclude_terms, default_exclude_terms());
        assert_eq!(spec.file_extensions, vec!["pdf"]);
        assert_eq!(spec.max_depth, 2);
        assert!(spec.follow_links);
        assert!(!spec.autostart);
    }

    #[test]
    fn test_explicit_empty_exclude_terms_disable_defaults() {
        let spec = parse_job_spec("name = \"No excludes\"\nsites = [\"example.com\"]\nexclude-terms = []").unwrap();
        assert!(spec.exclude_terms.is_empty());
    }

    #[test]
    fn test_parse_job_spec_rejects_invalid() {
        let result = parse_job_spec("name = \"Bad\"\nmin-file-size-mb = 10.0\nmax-file-size-mb = 1.0");
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_job_spec_from_file() {
        let file = create_temp_config("name = \"From file\"\nsites = [\"example.com\"]");
        let spec = load_job_spec(file.path()).unwrap();
        assert_eq!(spec.name, "From file");
    }
}
