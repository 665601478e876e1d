use crate::config::types::{
    Config, CrawlerConfig, DependentFetchConfig, PaginationConfig, PaginationStyle, SiteConfig,
    UserAgentConfig,
};
use crate::url::{CrawlUrlClass, Router};
use crate::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;

    if config.sites.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[site]] must be configured".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for site in &config.sites {
        if !names.insert(site.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate site name '{}'",
                site.name
            )));
        }
        validate_site(site)?;
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_sessions < 1 || config.max_concurrent_sessions > 64 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-sessions must be between 1 and 64, got {}",
            config.max_concurrent_sessions
        )));
    }

    if config.max_concurrent_subfetches < 1 || config.max_concurrent_subfetches > 32 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-subfetches must be between 1 and 32, got {}",
            config.max_concurrent_subfetches
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_pages_per_session == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages-per-session must be >= 1 when set".to_string(),
        ));
    }

    if config.max_records_per_session == Some(0) {
        return Err(ConfigError::Validation(
            "max-records-per-session must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates one site adapter
fn validate_site(site: &SiteConfig) -> Result<(), ConfigError> {
    if site.name.trim().is_empty() {
        return Err(ConfigError::Validation("site name cannot be empty".to_string()));
    }

    if site.hosts.is_empty() {
        return Err(ConfigError::Validation(format!(
            "site '{}' must list at least one host",
            site.name
        )));
    }

    for host in &site.hosts {
        validate_host_pattern(host)?;
    }

    if site.currency.len() != 3 || !site.currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(format!(
            "site '{}' currency must be a three-letter ISO code, got '{}'",
            site.name, site.currency
        )));
    }

    if !site
        .routes
        .iter()
        .any(|route| route.class == CrawlUrlClass::Detail)
    {
        return Err(ConfigError::Validation(format!(
            "site '{}' must declare at least one detail route",
            site.name
        )));
    }

    // Compiles every route pattern
    let router = Router::from_site(site)?;

    for pattern in &site.canonical.strip_path {
        compile_pattern(pattern)?;
    }

    for seed in &site.seeds {
        Url::parse(seed).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e))
        })?;

        if router.classify(seed) == CrawlUrlClass::Unsupported {
            return Err(ConfigError::Validation(format!(
                "seed '{}' of site '{}' matches no route",
                seed, site.name
            )));
        }
    }

    validate_pagination(&site.name, &site.pagination)?;

    for marker in &site.block_markers {
        if marker.is_empty() {
            return Err(ConfigError::Validation(format!(
                "site '{}' has an empty block marker",
                site.name
            )));
        }
    }

    if let Some(pattern) = &site.listing.view.embedded_json {
        compile_pattern(pattern)?;
    }
    if let Some(pattern) = &site.detail.view.embedded_json {
        compile_pattern(pattern)?;
    }

    if let Some(template) = &site.listing.detail_url_template {
        if !template.contains("{id}") {
            return Err(ConfigError::Validation(format!(
                "site '{}' detail-url-template must contain {{id}}",
                site.name
            )));
        }
    }

    let mut dependent_names = HashSet::new();
    for dependent in &site.dependents {
        if !dependent_names.insert(dependent.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "site '{}' declares dependent fetch '{}' twice",
                site.name, dependent.name
            )));
        }
        validate_dependent(&site.name, dependent)?;
    }

    Ok(())
}

fn validate_pagination(site: &str, pagination: &PaginationConfig) -> Result<(), ConfigError> {
    match pagination.style {
        PaginationStyle::Link => Ok(()),
        PaginationStyle::Offset | PaginationStyle::Page => match &pagination.param {
            Some(param) if !param.is_empty() => Ok(()),
            _ => Err(ConfigError::Validation(format!(
                "site '{}' pagination style {:?} requires a param",
                site, pagination.style
            ))),
        },
    }
}

fn validate_dependent(site: &str, dependent: &DependentFetchConfig) -> Result<(), ConfigError> {
    if dependent.name.is_empty() {
        return Err(ConfigError::Validation(format!(
            "site '{}' has a dependent fetch without a name",
            site
        )));
    }

    let uses_each = dependent.url.contains("{each}");
    if uses_each != dependent.each.is_some() {
        return Err(ConfigError::Validation(format!(
            "dependent fetch '{}' of site '{}' must use {{each}} exactly when `each` is set",
            dependent.name, site
        )));
    }

    if let Some(pattern) = &dependent.rules.view.embedded_json {
        compile_pattern(pattern)?;
    }

    Ok(())
}

/// Compiles a regex, mapping failures to a config error
pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern)
        .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
}

/// Validates a host pattern
fn validate_host_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host pattern cannot be empty".to_string(),
        ));
    }

    if let Some(base) = pattern.strip_prefix("*.") {
        if base.is_empty() || base.contains('*') {
            return Err(ConfigError::InvalidPattern(format!(
                "Invalid wildcard pattern: {}",
                pattern
            )));
        }
    } else if pattern.contains('*') {
        return Err(ConfigError::InvalidPattern(format!(
            "Wildcard must be at start with '*.' prefix: {}",
            pattern
        )));
    }

    Ok(())
}

/// Validates email address (basic validation)
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    let at_count = email.chars().filter(|&c| c == '@').count();
    if at_count != 1 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: {}",
            email
        )));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts[0].is_empty() || parts[1].is_empty() || !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: {}",
            email
        )));
    }

    Ok(())
}
