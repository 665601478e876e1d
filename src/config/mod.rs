//! Configuration module for Catalog-Ripple
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every site adapter (routes, pagination, field rules, dependent fetches) is
//! plain data in the config, so adding a site never touches the crawl loop.
//!
//! # Example
//!
//! ```no_run
//! use catalog_ripple::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("catalog.toml")).unwrap();
//! println!("Sessions in flight: {}", config.crawler.max_concurrent_sessions);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AxisRule, CanonicalConfig, Config, CrawlerConfig, DependentFetchConfig, DetailRules,
    ListingRules, MediaRule, MediaTemplates, OutputConfig, PaginationConfig, PaginationStyle,
    PriceRule, PriceUnit, RouteConfig, SelectRule, SiteConfig, StockRule, UserAgentConfig,
    VariantRule, ViewRules,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

pub(crate) use validation::compile_pattern;
