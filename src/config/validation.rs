use crate::config::types::{
    Config, DownloadConfig, ExtractorConfig, FeedConfig, JobsConfig, StopConfig, StoreBackend,
    UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_feed_config(&config.feed)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_download_config(&config.download)?;
    validate_extractor_config(&config.extractor)?;
    validate_stop_config(&config.stop)?;
    validate_jobs_config(&config.jobs)?;
    Ok(())
}

/// Validates feed configuration
fn validate_feed_config(config: &FeedConfig) -> Result<(), ConfigError> {
    if !config.endpoint.contains("{target}") {
        return Err(ConfigError::Validation(format!(
            "feed endpoint must contain a {{target}} placeholder, got '{}'",
            config.endpoint
        )));
    }

    let probe = config.endpoint_for("r/probe");
    let url = Url::parse(&probe)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid feed endpoint: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "feed endpoint must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.page_size < 1 || config.page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "page_size must be between 1 and 100, got {}",
            config.page_size
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
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

    if let Some(contact_url) = &config.contact_url {
        Url::parse(contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;
    }

    Ok(())
}

/// Validates direct download configuration
fn validate_download_config(config: &DownloadConfig) -> Result<(), ConfigError> {
    if config.min_file_size == 0 {
        return Err(ConfigError::Validation(
            "min_file_size must be >= 1 byte".to_string(),
        ));
    }

    if config.chunk_size < 512 {
        return Err(ConfigError::Validation(format!(
            "chunk_size must be >= 512 bytes, got {}",
            config.chunk_size
        )));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "download timeout_secs must be >= 1".to_string(),
        ));
    }

    for pattern in &config.video_hosts {
        validate_domain_pattern(pattern)?;
    }

    Ok(())
}

/// Validates extractor configuration
fn validate_extractor_config(config: &ExtractorConfig) -> Result<(), ConfigError> {
    if config.program.trim().is_empty() {
        return Err(ConfigError::Validation(
            "extractor program cannot be empty".to_string(),
        ));
    }

    if config.output_template.is_empty() || config.output_template.contains("..") {
        return Err(ConfigError::Validation(format!(
            "extractor output_template must be a plain file name template, got '{}'",
            config.output_template
        )));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "extractor timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates stop condition configuration
fn validate_stop_config(config: &StopConfig) -> Result<(), ConfigError> {
    if config.empty_page_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "empty_page_limit must be >= 1, got {}",
            config.empty_page_limit
        )));
    }

    if config.idle_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "idle_timeout_secs must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates job queue configuration
fn validate_jobs_config(config: &JobsConfig) -> Result<(), ConfigError> {
    for (name, path) in [
        ("queue_dir", &config.queue_dir),
        ("status_dir", &config.status_dir),
        ("media_dir", &config.media_dir),
        ("log_dir", &config.log_dir),
    ] {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    // Status files share the `<job_id>.json` naming with descriptors
    if config.queue_dir == config.status_dir {
        return Err(ConfigError::Validation(format!(
            "queue_dir and status_dir must differ, both are '{}'",
            config.queue_dir.display()
        )));
    }

    if config.max_concurrent_jobs < 1 || config.max_concurrent_jobs > 32 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_jobs must be between 1 and 32, got {}",
            config.max_concurrent_jobs
        )));
    }

    if config.poll_interval_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "poll_interval_ms must be >= 100ms, got {}ms",
            config.poll_interval_ms
        )));
    }

    if config.backend == StoreBackend::Sqlite && config.database_path.is_none() {
        return Err(ConfigError::Validation(
            "the sqlite backend requires database_path".to_string(),
        ));
    }

    Ok(())
}

/// Validates a host pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(domain) => validate_domain_string(domain),
        None => validate_domain_string(pattern),
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") || !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must be a dotted host name (e.g., 'imgur.com')",
            domain
        )));
    }

    Ok(())
}
