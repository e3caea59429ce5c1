use crate::config::types::{
    Config, CrawlerConfig, JobSpec, OutputConfig, QueueConfig, SearchConfig, UserAgentConfig,
};
use crate::url::seed_url;
use crate::ConfigError;
use url::Url;

/// Deepest page-link chain a job may request
const MAX_JOB_DEPTH: u32 = 10;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_queue_config(&config.queue)?;
    validate_search_config(&config.search)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_links_per_page < 1 {
        return Err(ConfigError::Validation(format!(
            "max_links_per_page must be >= 1, got {}",
            config.max_links_per_page
        )));
    }

    if config.max_site_workers < 1 || config.max_site_workers > 32 {
        return Err(ConfigError::Validation(format!(
            "max_site_workers must be between 1 and 32, got {}",
            config.max_site_workers
        )));
    }

    if config.batch_size < 1 || config.batch_size > 1000 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and 1000, got {}",
            config.batch_size
        )));
    }

    for (name, secs) in [
        ("request_timeout_secs", config.request_timeout_secs),
        ("connect_timeout_secs", config.connect_timeout_secs),
        ("size_probe_timeout_secs", config.size_probe_timeout_secs),
    ] {
        if secs < 1 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 1, got {}",
                name, secs
            )));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_queue_config(config: &QueueConfig) -> Result<(), ConfigError> {
    if config.stale_after_minutes < 1 {
        return Err(ConfigError::Validation(format!(
            "stale_after_minutes must be >= 1, got {}",
            config.stale_after_minutes
        )));
    }
    if config.heartbeat_secs < 1 {
        return Err(ConfigError::Validation(
            "heartbeat_secs must be >= 1".to_string(),
        ));
    }
    if config.lease_timeout_secs <= config.heartbeat_secs {
        return Err(ConfigError::Validation(format!(
            "lease_timeout_secs ({}) must exceed heartbeat_secs ({})",
            config.lease_timeout_secs, config.heartbeat_secs
        )));
    }
    Ok(())
}

fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid search endpoint: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Search endpoint '{}' must use HTTP or HTTPS",
            config.endpoint
        )));
    }

    if config.max_results < 1 {
        return Err(ConfigError::Validation(
            "search max_results must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates a crawl job definition before it is submitted
pub fn validate_job_spec(spec: &JobSpec) -> Result<(), ConfigError> {
    if spec.name.trim().is_empty() {
        return Err(ConfigError::Validation("job name cannot be empty".to_string()));
    }

    if spec.sites.is_empty() && spec.search_query().trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "job '{}' needs seed sites, a query, or search terms",
            spec.name
        )));
    }

    for site in &spec.sites {
        seed_url(site)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed site '{}': {}", site, e)))?;
    }

    for pattern in &spec.exclude_sites {
        if pattern.trim().is_empty() {
            return Err(ConfigError::InvalidPattern(
                "Excluded site pattern cannot be empty".to_string(),
            ));
        }
    }

    validate_extensions(&spec.file_extensions)?;
    validate_bounds(spec)?;

    if spec.max_depth > MAX_JOB_DEPTH {
        return Err(ConfigError::Validation(format!(
            "max_depth must be <= {}, got {}",
            MAX_JOB_DEPTH, spec.max_depth
        )));
    }

    Ok(())
}

fn validate_extensions(extensions: &[String]) -> Result<(), ConfigError> {
    if extensions.is_empty() {
        return Err(ConfigError::Validation(
            "at least one file extension is required".to_string(),
        ));
    }

    for ext in extensions {
        let bare = ext.trim().trim_start_matches('.');
        if bare.is_empty() || !bare.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Validation(format!(
                "Invalid file extension '{}'",
                ext
            )));
        }
    }

    Ok(())
}

fn validate_bounds(spec: &JobSpec) -> Result<(), ConfigError> {
    for size in [spec.min_file_size_mb, spec.max_file_size_mb].into_iter().flatten() {
        if !size.is_finite() || size < 0.0 {
            return Err(ConfigError::Validation(format!(
                "file size bounds must be non-negative, got {}",
                size
            )));
        }
    }

    if let (Some(min), Some(max)) = (spec.min_file_size_mb, spec.max_file_size_mb) {
        if min > max {
            return Err(ConfigError::Validation(format!(
                "min_file_size_mb ({}) exceeds max_file_size_mb ({})",
                min, max
            )));
        }
    }

    if let (Some(min), Some(max)) = (spec.min_pages, spec.max_pages) {
        if min > max {
            return Err(ConfigError::Validation(format!(
                "min_pages ({}) exceeds max_pages ({})",
                min, max
            )));
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
