//! Catalog-Ripple: a crawl-step protocol for e-commerce catalogs
//!
//! This crate classifies fetched pages by URL shape, walks paginated listings
//! with an immutable cursor, gathers the dependent sub-fetches a product page
//! needs, and normalizes arbitrarily-shaped source records into one canonical
//! Product/SKU/Price/Stock/Media document.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod model;
pub mod normalize;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Catalog-Ripple operations
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Step failed: {0}")]
    Step(#[from] StepError),

    #[error("Transport error: {0}")]
    Transport(#[from] crawler::TransportError),

    #[error("Sink error: {0}")]
    Sink(#[from] output::SinkError),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Machine-distinguishable kind of a terminal step failure
///
/// The serialized names are part of the stored failure log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// The URL matched no route; never retried
    Unsupported,
    /// Block page, network failure, or non-success status
    TransientFetch,
    /// Required fields could not be extracted
    Parse,
    /// A product could not be normalized (missing identity)
    Normalization,
    /// The consumer rejected a yielded value
    Sink,
    /// The caller cancelled the session
    Cancelled,
}

impl FailureKind {
    /// All kinds, in reporting order
    pub const ALL: [FailureKind; 6] = [
        Self::Unsupported,
        Self::TransientFetch,
        Self::Parse,
        Self::Normalization,
        Self::Sink,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsupported => "unsupported",
            Self::TransientFetch => "transient-fetch",
            Self::Parse => "parse",
            Self::Normalization => "normalization",
            Self::Sink => "sink",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == s)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of one crawl step
///
/// Every variant carries the offending URL.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    #[error("Unsupported URL {url}: {reason}")]
    Unsupported { url: String, reason: String },

    #[error("Transient fetch failure for {url} (status {status:?}): {reason}")]
    TransientFetch {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("Parse failure for {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Normalization failure for {url}: {message}")]
    Normalization { url: String, message: String },

    #[error("Sink rejected output of {url}: {message}")]
    Sink { url: String, message: String },

    #[error("Step cancelled at {url}")]
    Cancelled { url: String },
}

impl StepError {
    pub fn unsupported(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Unsupported {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn transient(
        url: impl Into<String>,
        status: Option<u16>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::TransientFetch {
            url: url.into(),
            status,
            reason: reason.to_string(),
        }
    }

    pub fn parse(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn normalization(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Normalization {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn sink(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Sink {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// The failure kind a supervisor dispatches on
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Unsupported { .. } => FailureKind::Unsupported,
            Self::TransientFetch { .. } => FailureKind::TransientFetch,
            Self::Parse { .. } => FailureKind::Parse,
            Self::Normalization { .. } => FailureKind::Normalization,
            Self::Sink { .. } => FailureKind::Sink,
            Self::Cancelled { .. } => FailureKind::Cancelled,
        }
    }

    /// The URL the failure is attributed to
    pub fn url(&self) -> &str {
        match self {
            Self::Unsupported { url, .. }
            | Self::TransientFetch { url, .. }
            | Self::Parse { url, .. }
            | Self::Normalization { url, .. }
            | Self::Sink { url, .. }
            | Self::Cancelled { url } => url,
        }
    }

    /// Whether re-issuing the same top-level request later can succeed
    ///
    /// Only transient failures qualify, and not when the server said the
    /// resource is gone.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::TransientFetch { status, .. } => !matches!(status, Some(404) | Some(410)),
            _ => false,
        }
    }
}

/// Result type alias for Catalog-Ripple operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Result type alias for a single crawl step
pub type StepResult<T> = std::result::Result<T, StepError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::Coordinator;
pub use model::{Media, Price, Product, ProductDocument, Sku, SpecOption, Stock, StockStatus};
pub use state::Cursor;
pub use crate::url::{normalize_url, Canonicalizer, CrawlUrlClass, Router};
