//! URL handling module for Catalog-Ripple
//!
//! This module provides URL normalization, wildcard host matching, the
//! per-site [`Router`] that classifies fetched URLs, and the
//! [`Canonicalizer`] that turns detail URLs into identity keys.

mod canonical;
mod matcher;
mod normalize;
mod router;

// Re-export main functions
pub use canonical::Canonicalizer;
pub use matcher::{host_matches, matches_wildcard};
pub use normalize::normalize_url;
pub use router::{CrawlUrlClass, Router};

use crate::UrlError;
use url::Url;

/// Resolves a possibly relative link against the page it was found on
///
/// The fragment is dropped; anything that is not HTTP(S) afterwards is an error.
pub fn resolve_link(base: &Url, href: &str) -> Result<Url, UrlError> {
    let mut url = base
        .join(href.trim())
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    url.set_fragment(None);
    Ok(url)
}
