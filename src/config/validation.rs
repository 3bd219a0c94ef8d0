use crate::config::types::{
    Config, CrawlerConfig, DetailsConfig, ListingConfig, OutputFormat, RetryConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_listing_config(&config.listing)?;
    if let Some(details) = &config.details {
        validate_details_config(details, &config.listing, config.output.format)?;
    }
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.progress_interval < 1 {
        return Err(ConfigError::Validation(
            "progress_interval must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.backoff_ms.is_empty() {
        return Err(ConfigError::Validation(
            "backoff_ms must list at least one delay".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
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

fn validate_listing_config(config: &ListingConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.page_param.is_empty() {
        return Err(ConfigError::Validation(
            "page_param cannot be empty".to_string(),
        ));
    }

    if config.last_page < config.first_page {
        return Err(ConfigError::Validation(format!(
            "last_page ({}) must be >= first_page ({})",
            config.last_page, config.first_page
        )));
    }

    validate_paths("listing", &config.output, &config.checkpoint)
}

fn validate_details_config(
    config: &DetailsConfig,
    listing: &ListingConfig,
    format: OutputFormat,
) -> Result<(), ConfigError> {
    validate_paths("details", &config.output, &config.checkpoint)?;

    // SQLite keeps each job in its own table, CSV needs separate files.
    if format == OutputFormat::Csv && config.output == listing.output {
        return Err(ConfigError::Validation(
            "details and listing must use different CSV output files".to_string(),
        ));
    }

    if config.checkpoint == listing.checkpoint {
        return Err(ConfigError::Validation(
            "details and listing must use different checkpoint files".to_string(),
        ));
    }

    Ok(())
}

fn validate_paths(job: &str, output: &str, checkpoint: &str) -> Result<(), ConfigError> {
    if output.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{} output path cannot be empty",
            job
        )));
    }

    if checkpoint.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{} checkpoint path cannot be empty",
            job
        )));
    }

    if output == checkpoint {
        return Err(ConfigError::Validation(format!(
            "{} output and checkpoint must be different files",
            job
        )));
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
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
